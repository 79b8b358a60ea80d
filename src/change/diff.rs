//! Snapshot diffing.

use serde::Serialize;

use crate::cache::snapshot::ConfigSnapshot;

/// A key whose value differs between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedKey {
    pub key: String,
    pub old_value: String,
    pub new_value: String,
}

/// Differences between two snapshots of the same namespace.
///
/// Every list is sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    /// Keys only present in the new snapshot, with their values.
    pub added: Vec<(String, String)>,
    /// Keys only present in the old snapshot, with their last values.
    pub removed: Vec<(String, String)>,
    /// Keys present in both with different values.
    pub changed: Vec<ChangedKey>,
}

impl ChangeEvent {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Total number of affected keys.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

/// Compute the change from `old` to `new`. An absent `old` reports every key as added.
pub fn diff(old: Option<&ConfigSnapshot>, new: &ConfigSnapshot) -> ChangeEvent {
    let mut event = ChangeEvent::default();

    for (key, new_value) in new.entries() {
        match old.and_then(|o| o.get(key)) {
            None => event.added.push((key.clone(), new_value.clone())),
            Some(old_value) if old_value != new_value => event.changed.push(ChangedKey {
                key: key.clone(),
                old_value: old_value.to_string(),
                new_value: new_value.clone(),
            }),
            Some(_) => {}
        }
    }

    if let Some(old) = old {
        for (key, old_value) in old.entries() {
            if new.get(key).is_none() {
                event.removed.push((key.clone(), old_value.clone()));
            }
        }
    }

    event.added.sort();
    event.removed.sort();
    event.changed.sort_by(|a, b| a.key.cmp(&b.key));
    event
}
