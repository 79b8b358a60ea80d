//! Error types shared across the client.
//!
//! Background failures (transport, corrupt cache, persistence, listeners) never
//! reach readers; they are logged where they happen and degrade to the best
//! available snapshot.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// A remote fetch failed to reach the service or to decode its answer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The fetch did not complete within the configured timeout.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The HTTP request could not be sent or its body could not be read.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with an unexpected status code.
    #[error("server returned status {0}")]
    Status(u16),

    /// The service does not know the requested namespace.
    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    /// The response body did not match the expected payload.
    #[error("invalid response payload: {0}")]
    Decode(String),

    /// The service could not be reached at all.
    #[error("server unreachable: {0}")]
    Unreachable(String),
}

/// A persisted snapshot exists but cannot be used.
#[derive(Debug, Error)]
pub enum CorruptCacheError {
    #[error("failed to read cache file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse cache file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache file {path} belongs to namespace {found:?}, expected {expected:?}")]
    NamespaceMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

/// A snapshot could not be written to disk.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize snapshot for namespace {namespace:?}: {source}")]
    Serialize {
        namespace: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("refusing to persist fallback-loaded snapshot for namespace {0:?}")]
    FallbackSnapshot(String),

    #[error("persistence task failed: {0}")]
    Task(String),
}

/// A change listener failed while handling an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenerError {
    #[error("listener failed: {0}")]
    Failed(String),

    #[error("listener panicked: {0}")]
    Panicked(String),
}

impl ListenerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Misuse of the in-memory cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("namespace {0:?} is not tracked by this client")]
    UnknownNamespace(String),

    #[error("applying a fetch result for namespace {namespace:?} aborted: {reason}")]
    ApplyAborted { namespace: String, reason: String },
}

/// Errors surfaced synchronously by the public client API.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
