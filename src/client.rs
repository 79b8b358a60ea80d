//! Caller-owned configuration client.
//!
//! Ties the namespace cache, disk store, change notifier and sync engine
//! together. Reads never wait on the network: they are served from the
//! in-memory cache, which the background loops keep fresh.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::cache::namespace::NamespaceCache;
use crate::cache::snapshot::ConfigSnapshot;
use crate::change::diff::ChangeEvent;
use crate::change::listener::{ChangeNotifier, ListenerId};
use crate::config::schema::ClientConfig;
use crate::config::validation::validate_config;
use crate::config::ConfigError;
use crate::disk::store::DiskCacheStore;
use crate::error::{ClientResult, ListenerError};
use crate::lifecycle::shutdown::Shutdown;
use crate::sync::engine::{SyncEngine, SyncOutcome};
use crate::sync::fetcher::RemoteFetcher;
use crate::sync::http::HttpFetcher;
use crate::sync::state::NamespaceStatus;

struct RunningLoops {
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

/// A configuration client for one application and a fixed set of namespaces.
pub struct ConfigClient {
    config: ClientConfig,
    cache: Arc<NamespaceCache>,
    notifier: Arc<ChangeNotifier>,
    engine: Arc<SyncEngine>,
    running: Mutex<Option<RunningLoops>>,
    is_running: AtomicBool,
}

impl ConfigClient {
    /// Build a client that talks to `config.app.config_server_url` over HTTP.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let fetcher = HttpFetcher::new(&config.app)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Build a client around a custom transport.
    pub fn with_fetcher(config: ClientConfig, fetcher: Arc<dyn RemoteFetcher>) -> ClientResult<Self> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let store = Arc::new(DiskCacheStore::new(&config.cache.dir, &config.app.app_id)?);
        let cache = Arc::new(NamespaceCache::new(config.namespaces.iter().cloned()));
        let notifier = Arc::new(ChangeNotifier::new());
        let engine = Arc::new(SyncEngine::new(
            &config.app,
            config.sync.clone(),
            fetcher,
            cache.clone(),
            store,
            notifier.clone(),
        ));

        Ok(Self {
            config,
            cache,
            notifier,
            engine,
            running: Mutex::new(None),
            is_running: AtomicBool::new(false),
        })
    }

    /// Load fallbacks, fetch every namespace once, then start the background loops.
    ///
    /// Calling `start` on a running client does nothing.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            tracing::debug!("Client already running");
            return;
        }

        tracing::info!(
            app_id = %self.config.app.app_id,
            cluster = %self.config.app.cluster,
            env = %self.config.app.env,
            namespaces = self.config.namespaces.len(),
            interval_ms = self.config.sync.interval_ms,
            "Starting configuration client"
        );

        let shutdown = Shutdown::new();
        let tasks = self.engine.start(&shutdown).await;
        *running = Some(RunningLoops { shutdown, tasks });
        self.is_running.store(true, Ordering::Release);
    }

    /// Stop the background loops and wait for every one of them to exit.
    ///
    /// Fetch results that are already being applied, including those of a
    /// dropped `refresh`, finish first. Safe to call any number of times.
    pub async fn stop(&self) {
        let loops = self.running.lock().await.take();
        let was_running = loops.is_some();
        if let Some(loops) = loops {
            self.is_running.store(false, Ordering::Release);
            loops.shutdown.trigger();
            for task in loops.tasks {
                if let Err(e) = task.await {
                    tracing::warn!(error = %e, "Sync loop ended abnormally");
                }
            }
        }

        self.engine.drain().await;
        if was_running {
            tracing::info!("Configuration client stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Current value of `key` in `namespace`, or `default`.
    pub fn get(&self, namespace: &str, key: &str, default: &str) -> String {
        self.cache.get(namespace, key, default)
    }

    pub fn get_value(&self, namespace: &str, key: &str) -> Option<String> {
        self.cache.get_value(namespace, key)
    }

    /// Current value parsed as `T`; `default` when missing or unparsable.
    pub fn get_parsed<T: FromStr>(&self, namespace: &str, key: &str, default: T) -> T {
        self.cache
            .get_value(namespace, key)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(default)
    }

    pub fn snapshot(&self, namespace: &str) -> Option<Arc<ConfigSnapshot>> {
        self.cache.current_snapshot(namespace)
    }

    /// Register a listener for changes to `namespace`.
    pub fn on_change<F>(&self, namespace: &str, listener: F) -> ListenerId
    where
        F: Fn(&str, &ChangeEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.notifier.subscribe(namespace, listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Fetch `namespace` now instead of waiting for the next tick.
    pub async fn refresh(&self, namespace: &str) -> ClientResult<SyncOutcome> {
        Ok(self.engine.sync_now(namespace).await?)
    }

    pub async fn refresh_all(&self) -> Vec<(String, SyncOutcome)> {
        self.engine.sync_all().await
    }

    pub fn status(&self, namespace: &str) -> Option<NamespaceStatus> {
        self.engine.status(namespace)
    }

    pub fn namespaces(&self) -> &[String] {
        &self.config.namespaces
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Drop for ConfigClient {
    fn drop(&mut self) {
        // Dropping without stop(): signal the loops so they exit on their own.
        if let Some(loops) = self.running.get_mut().take() {
            loops.shutdown.trigger();
        }
    }
}
