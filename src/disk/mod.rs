//! Disk fallback cache subsystem.
//!
//! # Data Flow
//! ```text
//! Successful remote fetch:
//!     → store.rs save (temp file → fsync → rename)
//!
//! Startup / remote unavailable:
//!     → store.rs load_best_effort
//!     → ConfigSnapshot (source = Fallback)
//!     → installed into the namespace cache
//! ```
//!
//! # Design Decisions
//! - One JSON file per namespace, named deterministically from app id and namespace
//! - Fallback-loaded snapshots are never written back
//! - Corrupt files degrade to "no fallback", never to a startup failure

pub mod store;

pub use store::{DiskCacheStore, PersistedCacheFile};
