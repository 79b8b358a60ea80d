//! Immutable configuration snapshots.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Where the data in a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    /// Fetched from the configuration service.
    Remote,
    /// Loaded from the disk cache at startup.
    Fallback,
}

/// An immutable key/value set for one namespace at one revision.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    entries: HashMap<String, String>,
    revision: String,
    fetched_at_ms: u64,
    source: SnapshotSource,
}

impl ConfigSnapshot {
    /// A freshly fetched snapshot stamped with the current time.
    pub fn new(revision: impl Into<String>, entries: HashMap<String, String>) -> Self {
        Self {
            entries,
            revision: revision.into(),
            fetched_at_ms: now_millis(),
            source: SnapshotSource::Remote,
        }
    }

    /// A snapshot restored from the disk cache.
    pub fn from_fallback(
        revision: impl Into<String>,
        entries: HashMap<String, String>,
        fetched_at_ms: u64,
    ) -> Self {
        Self {
            entries,
            revision: revision.into(),
            fetched_at_ms,
            source: SnapshotSource::Fallback,
        }
    }

    /// Build a remote snapshot from `(key, value)` pairs.
    pub fn from_pairs<K, V, I>(revision: impl Into<String>, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let entries = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(revision, entries)
    }

    /// A remote copy of this snapshot, stamped now. Used when the service
    /// confirms a revision that was loaded from disk.
    pub fn confirmed(&self) -> Self {
        Self::new(self.revision.clone(), self.entries.clone())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn entries(&self) -> &HashMap<String, String> {
        &self.entries
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn fetched_at_ms(&self) -> u64 {
        self.fetched_at_ms
    }

    pub fn source(&self) -> SnapshotSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when both snapshots hold exactly the same key/value pairs,
    /// regardless of revision or origin.
    pub fn same_content(&self, other: &ConfigSnapshot) -> bool {
        self.entries == other.entries
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
