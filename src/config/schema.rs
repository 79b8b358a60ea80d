//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the configuration client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Application identity and remote endpoint.
    pub app: AppConfig,

    /// Namespaces tracked for the lifetime of the client.
    pub namespaces: Vec<String>,

    /// Refresh loop settings.
    pub sync: SyncConfig,

    /// Disk fallback cache settings.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            namespaces: vec!["application".to_string()],
            sync: SyncConfig::default(),
            cache: CacheConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Shorthand for a config tracking `namespaces` of `app_id` with all other defaults.
    pub fn for_app(app_id: &str, namespaces: &[&str]) -> Self {
        Self {
            app: AppConfig {
                app_id: app_id.to_string(),
                ..AppConfig::default()
            },
            namespaces: namespaces.iter().map(|ns| ns.to_string()).collect(),
            ..Self::default()
        }
    }
}

/// Application identity on the configuration service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application id registered on the configuration service.
    pub app_id: String,

    /// Cluster name (default: "default").
    pub cluster: String,

    /// Base URL of the configuration service (e.g., "http://localhost:8090").
    pub config_server_url: String,

    /// Deployment environment label.
    pub env: String,

    /// Optional value sent verbatim in the `Authorization` header.
    pub authorization: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            cluster: "default".to_string(),
            config_server_url: "http://localhost:8090".to_string(),
            env: "DEV".to_string(),
            authorization: None,
        }
    }
}

/// Refresh loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Period between background refreshes in milliseconds.
    pub interval_ms: u64,

    /// Upper bound for a single remote fetch in milliseconds.
    pub fetch_timeout_ms: u64,

    /// Consecutive failures after which a namespace reports unhealthy.
    pub failure_threshold: u32,
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_ms: 60_000,
            fetch_timeout_ms: 15_000,
            failure_threshold: 3,
        }
    }
}

/// Disk fallback cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one snapshot file per namespace.
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("config-cache"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9091".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            namespaces = ["application", "database.properties"]

            [app]
            app_id = "demo"
            "#,
        )
        .unwrap();

        assert_eq!(config.app.app_id, "demo");
        assert_eq!(config.app.cluster, "default");
        assert_eq!(config.namespaces.len(), 2);
        assert_eq!(config.sync.interval(), Duration::from_secs(60));
        assert_eq!(config.sync.fetch_timeout(), Duration::from_secs(15));
        assert_eq!(config.cache.dir, PathBuf::from("config-cache"));
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_for_app() {
        let config = ClientConfig::for_app("demo", &["app", "db"]);
        assert_eq!(config.app.app_id, "demo");
        assert_eq!(config.namespaces, vec!["app".to_string(), "db".to_string()]);
        assert!(config.app.authorization.is_none());
    }
}
