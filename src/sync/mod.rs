//! Synchronization subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (engine.rs start):
//!     disk fallback → cache install (ticket 0)
//!     → one immediate fetch per namespace, concurrently
//!     → spawn one loop per namespace
//!
//! Every tick (engine.rs run_namespace):
//!     draw ticket (state.rs)
//!     → fetcher.rs RemoteFetcher::fetch (bounded by fetch timeout)
//!     → Unchanged: no-op, or promote a disk fallback to remote
//!     → Updated: content compare → install_if_newer → disk save → change notify
//!     → Error: failure counters, keep serving, retry next tick
//! ```
//!
//! # Design Decisions
//! - One task per namespace so a slow namespace never delays another
//! - Reconciliation compares content, not just the revision marker
//! - Tickets order installs; stale completions are discarded
//! - No background error ever reaches a reader

pub mod engine;
pub mod fetcher;
pub mod http;
pub mod state;

pub use engine::{SyncEngine, SyncOutcome};
pub use fetcher::{FetchOutcome, FetchRequest, RemoteFetcher};
pub use http::HttpFetcher;
pub use state::{NamespaceStatus, SyncState};
