//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use confsync::{ClientConfig, ConfigSnapshot, FetchOutcome, FetchRequest, RemoteFetcher, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// What the scripted fetcher answers for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Release(String, Vec<(String, String)>),
    Fail,
}

impl Reply {
    pub fn release(release_key: &str, pairs: &[(&str, &str)]) -> Self {
        Reply::Release(
            release_key.to_string(),
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        )
    }
}

#[derive(Debug, Default)]
struct Script {
    /// One-shot replies consumed in call order, with a delay before answering.
    queued: HashMap<String, VecDeque<(Duration, Reply)>>,
    /// Reply used once the queue is empty.
    steady: HashMap<String, Reply>,
    requests: Vec<FetchRequest>,
    /// Answer with the full release even when the release key matches.
    always_full: bool,
}

/// In-memory [`RemoteFetcher`] driven by a script.
///
/// A release whose key equals the request's release key is answered with
/// `Unchanged`, like the real service.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFetcher {
    script: Arc<Mutex<Script>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, namespace: &str, reply: Reply) {
        self.script.lock().unwrap().steady.insert(namespace.to_string(), reply);
    }

    pub fn push(&self, namespace: &str, delay: Duration, reply: Reply) {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(namespace.to_string())
            .or_default()
            .push_back((delay, reply));
    }

    pub fn answer_in_full(&self) {
        self.script.lock().unwrap().always_full = true;
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    pub fn call_count(&self) -> usize {
        self.script.lock().unwrap().requests.len()
    }
}

#[async_trait]
impl RemoteFetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, TransportError> {
        let (delay, reply, always_full) = {
            let mut script = self.script.lock().unwrap();
            let always_full = script.always_full;
            script.requests.push(request.clone());
            let queued = script
                .queued
                .get_mut(&request.namespace)
                .and_then(|queue| queue.pop_front());
            let (delay, reply) = match queued {
                Some(step) => step,
                None => (
                    Duration::ZERO,
                    script
                        .steady
                        .get(&request.namespace)
                        .cloned()
                        .unwrap_or(Reply::Fail),
                ),
            };
            (delay, reply, always_full)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Reply::Fail => Err(TransportError::Unreachable("scripted failure".into())),
            Reply::Release(key, _)
                if !always_full && request.release_key.as_deref() == Some(key.as_str()) =>
            {
                Ok(FetchOutcome::Unchanged)
            }
            Reply::Release(key, pairs) => Ok(FetchOutcome::Updated(ConfigSnapshot::from_pairs(key, pairs))),
        }
    }
}

/// Client config for app "demo" with fast timings and a cache under `dir`.
pub fn test_config(dir: &Path, namespaces: &[&str]) -> ClientConfig {
    let mut config = ClientConfig::for_app("demo", namespaces);
    config.cache.dir = dir.to_path_buf();
    config.sync.interval_ms = 100;
    config.sync.fetch_timeout_ms = 500;
    config.sync.failure_threshold = 3;
    config
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Start a programmable mock backend on an ephemeral port.
///
/// The handler receives the raw request head and returns a status and body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let head = read_request_head(&mut socket).await;
                        let (status, body) = f(head).await;
                        let status_text = match status {
                            200 => "200 OK",
                            304 => "304 Not Modified",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                head.extend_from_slice(&buf[..n]);
                if head.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}
