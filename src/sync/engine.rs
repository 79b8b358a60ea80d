//! Background synchronization engine.
//!
//! # Responsibilities
//! - Seed the cache from the disk fallback at startup
//! - Fetch every namespace once before the loops start
//! - Run one refresh loop per namespace until shutdown
//! - Reconcile fetched snapshots into the cache, the disk store and listeners

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::cache::namespace::{InstallOutcome, NamespaceCache};
use crate::cache::snapshot::{ConfigSnapshot, SnapshotSource};
use crate::change::diff::diff;
use crate::change::listener::ChangeNotifier;
use crate::config::schema::{AppConfig, SyncConfig};
use crate::disk::store::DiskCacheStore;
use crate::error::{CacheError, PersistenceError, TransportError};
use crate::lifecycle::shutdown::{Shutdown, ShutdownSignal};
use crate::observability::metrics::{self, FetchOutcomeLabel};
use crate::sync::fetcher::{FetchOutcome, FetchRequest, RemoteFetcher};
use crate::sync::state::{NamespaceHealth, NamespaceStatus};

/// What a single sync attempt did.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The service confirmed the current revision.
    Unchanged,
    /// Same content and revision as the current snapshot; nothing installed.
    Identical,
    /// New content installed; `changes` keys differ from the replaced snapshot.
    Updated { changes: usize },
    /// Same content under a new revision marker; installed without an event.
    RevisionOnly,
    /// A fresher fetch was installed first; this result was dropped.
    Discarded,
    /// The fetch failed; the current snapshot is still served.
    Failed(TransportError),
}

/// Drives fetch → reconcile → install → persist → notify for every namespace.
pub struct SyncEngine {
    app_id: String,
    cluster: String,
    settings: SyncConfig,
    fetcher: Arc<dyn RemoteFetcher>,
    cache: Arc<NamespaceCache>,
    store: Arc<DiskCacheStore>,
    notifier: Arc<ChangeNotifier>,
    health: HashMap<String, Arc<NamespaceHealth>>,
    /// Held shared by every result being applied; `drain` takes it exclusively.
    apply_gate: Arc<RwLock<()>>,
}

impl SyncEngine {
    pub fn new(
        app: &AppConfig,
        settings: SyncConfig,
        fetcher: Arc<dyn RemoteFetcher>,
        cache: Arc<NamespaceCache>,
        store: Arc<DiskCacheStore>,
        notifier: Arc<ChangeNotifier>,
    ) -> Self {
        let health = cache
            .namespaces()
            .map(|ns| (ns.to_string(), Arc::new(NamespaceHealth::default())))
            .collect();

        Self {
            app_id: app.app_id.clone(),
            cluster: app.cluster.clone(),
            settings,
            fetcher,
            cache,
            store,
            notifier,
            health,
            apply_gate: Arc::new(RwLock::new(())),
        }
    }

    /// Run the startup sequence and spawn one loop per namespace.
    ///
    /// Returns once every namespace has had its fallback loaded and its first
    /// fetch attempted; the returned handles finish after `shutdown` triggers.
    pub async fn start(self: &Arc<Self>, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let namespaces: Vec<String> = self.health.keys().cloned().collect();

        for namespace in &namespaces {
            self.load_fallback(namespace).await;
        }

        let initial = join_all(namespaces.iter().map(|ns| self.sync_now(ns))).await;
        for (namespace, result) in namespaces.iter().zip(initial) {
            if let Ok(outcome) = result {
                tracing::info!(namespace = %namespace, outcome = ?outcome, "Initial sync finished");
            }
        }

        namespaces
            .into_iter()
            .map(|namespace| {
                let engine = Arc::clone(self);
                let signal = shutdown.subscribe();
                tokio::spawn(async move { engine.run_namespace(namespace, signal).await })
            })
            .collect()
    }

    /// Install the disk snapshot for `namespace`, if one exists and nothing
    /// is installed yet.
    pub async fn load_fallback(&self, namespace: &str) -> bool {
        let Some(health) = self.health.get(namespace) else {
            return false;
        };
        if self.cache.current_snapshot(namespace).is_some() {
            return false;
        }

        let store = Arc::clone(&self.store);
        let ns = namespace.to_string();
        let loaded = tokio::task::spawn_blocking(move || store.load_best_effort(&ns))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(namespace = %namespace, error = %e, "Disk cache load task failed");
                None
            });

        let Some(snapshot) = loaded else {
            tracing::debug!(namespace = %namespace, "No disk fallback available");
            return false;
        };

        let revision = snapshot.revision().to_string();
        let keys = snapshot.len();
        match self.cache.install_if_newer(namespace, Arc::new(snapshot), 0) {
            Ok(InstallOutcome::Installed { .. }) => {
                health.mark_fallback_loaded();
                tracing::info!(namespace = %namespace, revision = %revision, keys, "Loaded snapshot from disk fallback");
                true
            }
            // A ticket-0 install only fails when something is already installed.
            Ok(InstallOutcome::Stale { .. }) | Err(_) => false,
        }
    }

    /// Fetch and reconcile one namespace immediately.
    ///
    /// Only the fetch itself can be cancelled. Once a result exists it is
    /// applied in a separate task, so install, persist and notify always run
    /// to completion even if the caller stops waiting.
    pub async fn sync_now(self: &Arc<Self>, namespace: &str) -> Result<SyncOutcome, CacheError> {
        let health = self
            .health
            .get(namespace)
            .ok_or_else(|| CacheError::UnknownNamespace(namespace.to_string()))?;

        let ticket = health.next_ticket();
        let current = self.cache.current_snapshot(namespace);
        let request = FetchRequest {
            app_id: self.app_id.clone(),
            cluster: self.cluster.clone(),
            namespace: namespace.to_string(),
            release_key: current.as_ref().map(|s| s.revision().to_string()),
        };

        let timeout = self.settings.fetch_timeout();
        let result = match time::timeout(timeout, self.fetcher.fetch(&request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        };

        let gate = Arc::clone(&self.apply_gate).read_owned().await;
        let engine = Arc::clone(self);
        let health = Arc::clone(health);
        let ns = namespace.to_string();
        let applied = tokio::spawn(async move {
            let _gate = gate;
            engine.apply(&ns, &health, ticket, current, result).await
        });

        match applied.await {
            Ok(outcome) => outcome,
            Err(e) => Err(CacheError::ApplyAborted {
                namespace: namespace.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Fetch every namespace concurrently.
    pub async fn sync_all(self: &Arc<Self>) -> Vec<(String, SyncOutcome)> {
        let namespaces: Vec<&String> = self.health.keys().collect();
        let results = join_all(namespaces.iter().map(|ns| self.sync_now(ns))).await;
        namespaces
            .into_iter()
            .zip(results)
            .filter_map(|(ns, result)| result.ok().map(|outcome| (ns.clone(), outcome)))
            .collect()
    }

    /// Wait until every fetched result still being applied is done.
    pub async fn drain(&self) {
        drop(self.apply_gate.write().await);
    }

    async fn apply(
        &self,
        namespace: &str,
        health: &NamespaceHealth,
        ticket: u64,
        current: Option<Arc<ConfigSnapshot>>,
        result: Result<FetchOutcome, TransportError>,
    ) -> Result<SyncOutcome, CacheError> {
        match result {
            Ok(FetchOutcome::Unchanged) => {
                metrics::record_fetch(namespace, FetchOutcomeLabel::Unchanged);
                // Nothing to confirm when no snapshot is held; stay unsynced.
                if let Some(current) = &current {
                    self.mark_success(namespace, health);
                    if current.source() == SnapshotSource::Fallback {
                        self.confirm_fallback(namespace, current, ticket)?;
                    }
                }
                tracing::debug!(namespace = %namespace, "Remote reports no change");
                Ok(SyncOutcome::Unchanged)
            }
            Ok(FetchOutcome::Updated(snapshot)) => {
                metrics::record_fetch(namespace, FetchOutcomeLabel::Updated);
                self.mark_success(namespace, health);
                self.reconcile(namespace, ticket, snapshot).await
            }
            Err(e) => {
                metrics::record_fetch(namespace, FetchOutcomeLabel::Failed);
                self.record_failure(namespace, health, &e, current.is_some());
                Ok(SyncOutcome::Failed(e))
            }
        }
    }

    async fn reconcile(
        &self,
        namespace: &str,
        ticket: u64,
        snapshot: ConfigSnapshot,
    ) -> Result<SyncOutcome, CacheError> {
        if let Some(current) = self.cache.current_snapshot(namespace) {
            if current.same_content(&snapshot) && current.revision() == snapshot.revision() {
                if current.source() == SnapshotSource::Fallback {
                    self.confirm_fallback(namespace, &current, ticket)?;
                }
                return Ok(SyncOutcome::Identical);
            }
        }

        let snapshot = Arc::new(snapshot);
        let previous = match self
            .cache
            .install_if_newer(namespace, Arc::clone(&snapshot), ticket)?
        {
            InstallOutcome::Installed { previous } => previous,
            InstallOutcome::Stale { current_ticket } => {
                tracing::debug!(
                    namespace = %namespace,
                    ticket,
                    current_ticket,
                    "Discarding stale fetch completion"
                );
                return Ok(SyncOutcome::Discarded);
            }
        };

        metrics::record_install(namespace);
        self.persist(namespace, Arc::clone(&snapshot), ticket).await;

        let Some(previous) = previous else {
            tracing::info!(
                namespace = %namespace,
                revision = %snapshot.revision(),
                keys = snapshot.len(),
                "Installed first snapshot"
            );
            return Ok(SyncOutcome::Updated { changes: snapshot.len() });
        };

        let event = diff(Some(&previous), &snapshot);
        if event.is_empty() {
            tracing::info!(
                namespace = %namespace,
                revision = %snapshot.revision(),
                "Revision changed without content change"
            );
            return Ok(SyncOutcome::RevisionOnly);
        }

        tracing::info!(
            namespace = %namespace,
            revision = %snapshot.revision(),
            added = event.added.len(),
            removed = event.removed.len(),
            changed = event.changed.len(),
            "Installed new snapshot"
        );
        let report = self.notifier.notify(namespace, &event);
        if !report.failed.is_empty() {
            tracing::debug!(
                namespace = %namespace,
                delivered = report.delivered,
                failed = report.failed.len(),
                "Change delivered with listener failures"
            );
        }
        Ok(SyncOutcome::Updated { changes: event.len() })
    }

    /// Swap a disk-loaded snapshot for a remote copy once the service has
    /// confirmed its revision. Content is unchanged, so nothing is saved or
    /// notified.
    fn confirm_fallback(
        &self,
        namespace: &str,
        current: &ConfigSnapshot,
        ticket: u64,
    ) -> Result<(), CacheError> {
        let confirmed = Arc::new(current.confirmed());
        if let InstallOutcome::Installed { .. } =
            self.cache.install_if_newer(namespace, confirmed, ticket)?
        {
            tracing::info!(
                namespace = %namespace,
                revision = %current.revision(),
                "Remote confirmed disk fallback revision"
            );
        }
        Ok(())
    }

    async fn persist(&self, namespace: &str, snapshot: Arc<ConfigSnapshot>, ticket: u64) {
        let store = Arc::clone(&self.store);
        let ns = namespace.to_string();
        let result = tokio::task::spawn_blocking(move || store.save_if_newer(&ns, &snapshot, ticket))
            .await
            .unwrap_or_else(|e| Err(PersistenceError::Task(e.to_string())));

        if let Err(e) = result {
            metrics::record_persist_failure(namespace);
            tracing::warn!(namespace = %namespace, error = %e, "Failed to persist snapshot; in-memory cache unaffected");
        }
    }

    fn mark_success(&self, namespace: &str, health: &NamespaceHealth) {
        let was_healthy = health.is_healthy(self.settings.failure_threshold);
        health.mark_success();
        if !was_healthy {
            tracing::info!(namespace = %namespace, "Namespace recovered");
        }
        metrics::record_namespace_health(namespace, true);
    }

    fn record_failure(
        &self,
        namespace: &str,
        health: &NamespaceHealth,
        error: &TransportError,
        has_snapshot: bool,
    ) {
        let failures = health.mark_failure(has_snapshot);
        tracing::warn!(
            namespace = %namespace,
            error = %error,
            consecutive_failures = failures,
            serving_snapshot = has_snapshot,
            "Fetch failed; keeping last known snapshot"
        );
        if failures == self.settings.failure_threshold {
            tracing::error!(
                namespace = %namespace,
                consecutive_failures = failures,
                "Namespace marked unhealthy"
            );
        }
        metrics::record_namespace_health(
            namespace,
            health.is_healthy(self.settings.failure_threshold),
        );
    }

    async fn run_namespace(self: Arc<Self>, namespace: String, mut shutdown: ShutdownSignal) {
        let interval = self.settings.interval();
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(namespace = %namespace, interval_ms = interval.as_millis() as u64, "Sync loop starting");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        // A result already fetched keeps being applied; stop() drains it.
                        _ = shutdown.recv() => {
                            tracing::debug!(namespace = %namespace, "Abandoning in-flight sync for shutdown");
                            break;
                        }
                        _ = self.sync_now(&namespace) => {}
                    }
                }
            }
        }

        tracing::debug!(namespace = %namespace, "Sync loop stopped");
    }

    /// Current status of a namespace.
    pub fn status(&self, namespace: &str) -> Option<NamespaceStatus> {
        let health = self.health.get(namespace)?;
        let current = self.cache.current_snapshot(namespace);
        Some(NamespaceStatus {
            namespace: namespace.to_string(),
            state: health.state(),
            source: current.as_ref().map(|s| s.source()),
            revision: current.as_ref().map(|s| s.revision().to_string()),
            consecutive_failures: health.consecutive_failures(),
            total_failures: health.total_failures(),
            last_success_ms: health.last_success_ms(),
            healthy: health.is_healthy(self.settings.failure_threshold),
        })
    }
}
