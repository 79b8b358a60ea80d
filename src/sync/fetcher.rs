//! Remote fetcher boundary.

use async_trait::async_trait;

use crate::cache::snapshot::ConfigSnapshot;
use crate::error::TransportError;

/// Identifies one namespace fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub app_id: String,
    pub cluster: String,
    pub namespace: String,
    /// Revision marker of the snapshot currently served, if any.
    pub release_key: Option<String>,
}

/// Answer of the configuration service for one namespace.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The service confirmed the revision we already hold.
    Unchanged,
    /// A full snapshot of the namespace.
    Updated(ConfigSnapshot),
}

/// Transport to the configuration service.
///
/// Implementations do not need their own timeout; the sync engine bounds
/// every call.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, TransportError>;
}
