//! HTTP fetcher for the configuration service.
//!
//! Reads the latest release of a namespace from
//! `{server}/apps/{app}/clusters/{cluster}/namespaces/{namespace}/releases/latest`.
//! The body carries a `releaseKey` and a `configurations` field that is
//! either a JSON object or a string containing one.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::cache::snapshot::{now_millis, ConfigSnapshot};
use crate::config::schema::AppConfig;
use crate::config::validation::ValidationError;
use crate::config::ConfigError;
use crate::error::{ClientError, TransportError};
use crate::sync::fetcher::{FetchOutcome, FetchRequest, RemoteFetcher};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseResponse {
    release_key: Option<String>,
    #[serde(default)]
    configurations: Value,
}

/// [`RemoteFetcher`] talking to the configuration service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
    authorization: Option<String>,
}

impl HttpFetcher {
    pub fn new(app: &AppConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&app.config_server_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                ClientError::Config(ConfigError::Validation(vec![
                    ValidationError::InvalidServerUrl(app.config_server_url.clone()),
                ]))
            })?;

        let client = Client::builder()
            .build()
            .map_err(ClientError::HttpClient)?;

        Ok(Self {
            client,
            base_url,
            authorization: app.authorization.clone(),
        })
    }

    /// Release URL for a request, with the path segments percent-encoded.
    pub fn release_url(&self, request: &FetchRequest) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "apps",
                request.app_id.as_str(),
                "clusters",
                request.cluster.as_str(),
                "namespaces",
                request.namespace.as_str(),
                "releases",
                "latest",
            ]);
        }
        if let Some(release_key) = &request.release_key {
            url.query_pairs_mut().append_pair("releaseKey", release_key);
        }
        url
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, TransportError> {
        let url = self.release_url(request);
        let mut builder = self.client.get(url);
        if let Some(authorization) = &self.authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() {
                TransportError::Unreachable(e.to_string())
            } else {
                TransportError::Request(e)
            }
        })?;
        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::Unchanged);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(TransportError::NamespaceNotFound(request.namespace.clone()));
        }
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let release: ReleaseResponse = serde_json::from_slice(&body)
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        let release_key = release
            .release_key
            .unwrap_or_else(|| now_millis().to_string());
        if request.release_key.as_deref() == Some(release_key.as_str()) {
            return Ok(FetchOutcome::Unchanged);
        }

        let entries = decode_configurations(release.configurations)?;
        Ok(FetchOutcome::Updated(ConfigSnapshot::new(release_key, entries)))
    }
}

/// Flatten the `configurations` field into string pairs.
fn decode_configurations(value: Value) -> Result<HashMap<String, String>, TransportError> {
    let object = match value {
        Value::Null => return Ok(HashMap::new()),
        Value::String(raw) if raw.trim().is_empty() => return Ok(HashMap::new()),
        Value::String(raw) => serde_json::from_str::<Value>(&raw)
            .map_err(|e| TransportError::Decode(format!("configurations: {}", e)))?,
        other => other,
    };

    match object {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect()),
        other => Err(TransportError::Decode(format!(
            "configurations must be an object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(release_key: Option<&str>) -> FetchRequest {
        FetchRequest {
            app_id: "demo".into(),
            cluster: "default".into(),
            namespace: "db config".into(),
            release_key: release_key.map(str::to_string),
        }
    }

    #[test]
    fn test_release_url() {
        let app = AppConfig {
            config_server_url: "http://localhost:8090/".into(),
            ..AppConfig::default()
        };
        let fetcher = HttpFetcher::new(&app).unwrap();

        let url = fetcher.release_url(&request(None));
        assert_eq!(
            url.as_str(),
            "http://localhost:8090/apps/demo/clusters/default/namespaces/db%20config/releases/latest"
        );

        let url = fetcher.release_url(&request(Some("r1")));
        assert_eq!(url.query(), Some("releaseKey=r1"));
    }

    #[test]
    fn test_invalid_server_url() {
        let app = AppConfig {
            config_server_url: "not a url".into(),
            ..AppConfig::default()
        };
        assert!(matches!(HttpFetcher::new(&app), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_decode_string_and_object_configurations() {
        let from_string = decode_configurations(json!("{\"timeout\":\"30\",\"retries\":3}")).unwrap();
        assert_eq!(from_string.get("timeout").map(String::as_str), Some("30"));
        assert_eq!(from_string.get("retries").map(String::as_str), Some("3"));

        let from_object = decode_configurations(json!({"enabled": true})).unwrap();
        assert_eq!(from_object.get("enabled").map(String::as_str), Some("true"));

        assert!(decode_configurations(Value::Null).unwrap().is_empty());
        assert!(decode_configurations(json!("")).unwrap().is_empty());
        assert!(matches!(
            decode_configurations(json!([1, 2])),
            Err(TransportError::Decode(_))
        ));
    }
}
