//! In-memory configuration cache.
//!
//! # Data Flow
//! ```text
//! Sync engine (only writer):
//!     → namespace.rs install_if_newer (ticket guard)
//!     → atomic swap of Arc<NamespaceCacheEntry>
//!
//! Readers (any thread):
//!     → namespace.rs get / current_snapshot
//!     → lock-free load of the current entry
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; updates replace them wholesale
//! - One ArcSwap per namespace: readers never wait on writers
//! - The previous snapshot is retained for change diffs

pub mod namespace;
pub mod snapshot;

pub use namespace::{InstallOutcome, NamespaceCache, NamespaceCacheEntry};
pub use snapshot::{ConfigSnapshot, SnapshotSource};
