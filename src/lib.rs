//! Client-side cache for namespaced remote configuration.

pub mod cache;
pub mod change;
pub mod client;
pub mod config;
pub mod disk;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod sync;

pub use cache::{ConfigSnapshot, NamespaceCache, SnapshotSource};
pub use change::{ChangeEvent, ChangedKey, ListenerId};
pub use client::ConfigClient;
pub use config::ClientConfig;
pub use disk::DiskCacheStore;
pub use error::{ClientError, ListenerError, TransportError};
pub use sync::{FetchOutcome, FetchRequest, NamespaceStatus, RemoteFetcher, SyncOutcome, SyncState};
