//! Change listener registry and delivery.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::change::diff::ChangeEvent;
use crate::error::ListenerError;
use crate::observability::metrics;

/// Callback invoked with the namespace and its change event.
pub type ChangeListener = Arc<dyn Fn(&str, &ChangeEvent) -> Result<(), ListenerError> + Send + Sync>;

/// Handle returned by [`ChangeNotifier::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Outcome of delivering one event.
#[derive(Debug, Default)]
pub struct NotifyReport {
    /// Listeners that returned successfully.
    pub delivered: usize,
    /// Listeners that failed, with their errors.
    pub failed: Vec<(ListenerId, ListenerError)>,
}

/// Per-namespace listener registry.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: DashMap<String, Vec<(ListenerId, ChangeListener)>>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `namespace`.
    pub fn subscribe<F>(&self, namespace: &str, listener: F) -> ListenerId
    where
        F: Fn(&str, &ChangeEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .entry(namespace.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut removed = false;
        for mut entry in self.listeners.iter_mut() {
            let before = entry.value().len();
            entry.value_mut().retain(|(existing, _)| *existing != id);
            removed |= entry.value().len() != before;
        }
        removed
    }

    pub fn listener_count(&self, namespace: &str) -> usize {
        self.listeners.get(namespace).map(|l| l.len()).unwrap_or(0)
    }

    /// Deliver `event` to every listener of `namespace`.
    ///
    /// Each listener runs in isolation: an error or panic is logged and
    /// recorded in the report, and the remaining listeners still run.
    pub fn notify(&self, namespace: &str, event: &ChangeEvent) -> NotifyReport {
        let mut report = NotifyReport::default();
        if event.is_empty() {
            return report;
        }

        // Clone the list so no shard lock is held while user code runs.
        let listeners: Vec<(ListenerId, ChangeListener)> = match self.listeners.get(namespace) {
            Some(entry) => entry.value().clone(),
            None => return report,
        };

        for (id, listener) in listeners {
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener(namespace, event)))
                .unwrap_or_else(|payload| Err(ListenerError::Panicked(panic_message(&*payload))));

            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(namespace = %namespace, listener = id.0, error = %e, "Change listener failed");
                    metrics::record_listener_failure(namespace);
                    report.failed.push((id, e));
                }
            }
        }
        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
