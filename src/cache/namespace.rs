//! Thread-safe in-memory namespace cache.
//!
//! # Responsibilities
//! - Hold the current (and previous) snapshot for every declared namespace
//! - Serve reads without locks or I/O
//! - Order installs so a stale completion never replaces a fresher snapshot

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;

use crate::cache::snapshot::ConfigSnapshot;
use crate::error::CacheError;

/// The installed state of one namespace.
#[derive(Debug)]
pub struct NamespaceCacheEntry {
    pub current: Arc<ConfigSnapshot>,
    pub previous: Option<Arc<ConfigSnapshot>>,
    /// Ticket of the fetch that produced `current` (0 for fallback data).
    pub ticket: u64,
}

/// Result of a guarded install.
#[derive(Debug)]
pub enum InstallOutcome {
    /// The snapshot is now current; carries the snapshot it replaced.
    Installed { previous: Option<Arc<ConfigSnapshot>> },
    /// A snapshot from an equal or newer fetch is already current.
    Stale { current_ticket: u64 },
}

#[derive(Debug, Default)]
struct NamespaceSlot {
    entry: ArcSwapOption<NamespaceCacheEntry>,
    /// Serializes writers only. Readers go through `entry` and never take it.
    write_lock: Mutex<()>,
}

/// In-memory mapping from namespace to its current snapshot.
///
/// The namespace set is fixed at construction, so the outer map is never
/// mutated and needs no synchronization. Each slot swaps an immutable entry
/// atomically: a reader sees the old or the new snapshot in full.
#[derive(Debug)]
pub struct NamespaceCache {
    slots: HashMap<String, NamespaceSlot>,
}

impl NamespaceCache {
    /// Create an empty cache tracking the given namespaces.
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots = namespaces
            .into_iter()
            .map(|ns| (ns.into(), NamespaceSlot::default()))
            .collect();
        Self { slots }
    }

    /// Declared namespaces, in no particular order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.slots.contains_key(namespace)
    }

    /// Current value of `key`, or `default` when the key or namespace is unknown.
    pub fn get(&self, namespace: &str, key: &str, default: &str) -> String {
        self.get_value(namespace, key)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_value(&self, namespace: &str, key: &str) -> Option<String> {
        let slot = self.slots.get(namespace)?;
        let guard = slot.entry.load();
        match &*guard {
            Some(entry) => entry.current.get(key).map(str::to_string),
            None => None,
        }
    }

    pub fn current_snapshot(&self, namespace: &str) -> Option<Arc<ConfigSnapshot>> {
        self.entry(namespace).map(|entry| entry.current.clone())
    }

    pub fn previous_snapshot(&self, namespace: &str) -> Option<Arc<ConfigSnapshot>> {
        self.entry(namespace).and_then(|entry| entry.previous.clone())
    }

    /// The full installed entry for a namespace.
    pub fn entry(&self, namespace: &str) -> Option<Arc<NamespaceCacheEntry>> {
        self.slots.get(namespace)?.entry.load_full()
    }

    /// Unconditionally install `snapshot`, returning the one it replaced.
    pub fn install(
        &self,
        namespace: &str,
        snapshot: ConfigSnapshot,
    ) -> Result<Option<Arc<ConfigSnapshot>>, CacheError> {
        let slot = self.slot(namespace)?;
        let _writer = slot.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let old = slot.entry.load_full();
        let ticket = old.as_ref().map(|entry| entry.ticket).unwrap_or(0);
        Ok(Self::swap_in(slot, old, Arc::new(snapshot), ticket))
    }

    /// Install `snapshot` only if `ticket` is newer than the current entry's.
    pub fn install_if_newer(
        &self,
        namespace: &str,
        snapshot: Arc<ConfigSnapshot>,
        ticket: u64,
    ) -> Result<InstallOutcome, CacheError> {
        let slot = self.slot(namespace)?;
        let _writer = slot.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let old = slot.entry.load_full();
        if let Some(entry) = &old {
            if entry.ticket >= ticket {
                return Ok(InstallOutcome::Stale {
                    current_ticket: entry.ticket,
                });
            }
        }
        let previous = Self::swap_in(slot, old, snapshot, ticket);
        Ok(InstallOutcome::Installed { previous })
    }

    fn swap_in(
        slot: &NamespaceSlot,
        old: Option<Arc<NamespaceCacheEntry>>,
        snapshot: Arc<ConfigSnapshot>,
        ticket: u64,
    ) -> Option<Arc<ConfigSnapshot>> {
        let previous = old.map(|entry| entry.current.clone());
        slot.entry.store(Some(Arc::new(NamespaceCacheEntry {
            current: snapshot,
            previous: previous.clone(),
            ticket,
        })));
        previous
    }

    fn slot(&self, namespace: &str) -> Result<&NamespaceSlot, CacheError> {
        self.slots
            .get(namespace)
            .ok_or_else(|| CacheError::UnknownNamespace(namespace.to_string()))
    }
}
