//! HTTP fetcher against a programmable mock configuration service.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use confsync::config::AppConfig;
use confsync::sync::HttpFetcher;
use confsync::{ConfigClient, FetchOutcome, FetchRequest, RemoteFetcher, TransportError};

mod common;
use common::{start_programmable_backend, test_config, wait_until};

fn fetcher_for(addr: SocketAddr, authorization: Option<&str>) -> HttpFetcher {
    let app = AppConfig {
        app_id: "demo".into(),
        config_server_url: format!("http://{}", addr),
        authorization: authorization.map(str::to_string),
        ..AppConfig::default()
    };
    HttpFetcher::new(&app).unwrap()
}

fn request(release_key: Option<&str>) -> FetchRequest {
    FetchRequest {
        app_id: "demo".into(),
        cluster: "default".into(),
        namespace: "application".into(),
        release_key: release_key.map(str::to_string),
    }
}

/// Backend that answers every request with `status` and `body`, recording request heads.
async fn fixed_backend(status: u16, body: &'static str) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let addr = start_programmable_backend(move |head| {
        log.lock().unwrap().push(head);
        async move { (status, body.to_string()) }
    })
    .await;
    (addr, seen)
}

#[tokio::test]
async fn test_release_with_string_configurations() {
    let (addr, seen) = fixed_backend(
        200,
        r#"{"appId":"demo","releaseKey":"20240101-r1","configurations":"{\"timeout\":\"30\",\"retries\":\"3\"}"}"#,
    )
    .await;

    let outcome = fetcher_for(addr, None).fetch(&request(None)).await.unwrap();
    let FetchOutcome::Updated(snapshot) = outcome else {
        panic!("expected an update");
    };
    assert_eq!(snapshot.revision(), "20240101-r1");
    assert_eq!(snapshot.get("timeout"), Some("30"));
    assert_eq!(snapshot.get("retries"), Some("3"));

    let heads = seen.lock().unwrap();
    assert!(heads[0].starts_with(
        "GET /apps/demo/clusters/default/namespaces/application/releases/latest HTTP/1.1"
    ));
}

#[tokio::test]
async fn test_release_with_object_configurations() {
    let (addr, _) = fixed_backend(
        200,
        r#"{"releaseKey":"r2","configurations":{"enabled":true,"name":"svc"}}"#,
    )
    .await;

    let FetchOutcome::Updated(snapshot) = fetcher_for(addr, None).fetch(&request(None)).await.unwrap() else {
        panic!("expected an update");
    };
    assert_eq!(snapshot.get("enabled"), Some("true"));
    assert_eq!(snapshot.get("name"), Some("svc"));
}

#[tokio::test]
async fn test_matching_release_key_is_unchanged() {
    let (addr, seen) = fixed_backend(200, r#"{"releaseKey":"r1","configurations":{"k":"v"}}"#).await;

    let outcome = fetcher_for(addr, None).fetch(&request(Some("r1"))).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::Unchanged));
    assert!(seen.lock().unwrap()[0].contains("releaseKey=r1"));
}

#[tokio::test]
async fn test_not_modified_is_unchanged() {
    let (addr, _) = fixed_backend(304, "").await;
    let outcome = fetcher_for(addr, None).fetch(&request(Some("r1"))).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::Unchanged));
}

#[tokio::test]
async fn test_error_statuses() {
    let (addr, _) = fixed_backend(404, r#"{"message":"not found"}"#).await;
    match fetcher_for(addr, None).fetch(&request(None)).await {
        Err(TransportError::NamespaceNotFound(ns)) => assert_eq!(ns, "application"),
        other => panic!("expected NamespaceNotFound, got {:?}", other),
    }

    let (addr, _) = fixed_backend(500, "boom").await;
    assert!(matches!(
        fetcher_for(addr, None).fetch(&request(None)).await,
        Err(TransportError::Status(500))
    ));
}

#[tokio::test]
async fn test_malformed_body_is_a_decode_error() {
    let (addr, _) = fixed_backend(200, "<html>nope</html>").await;
    assert!(matches!(
        fetcher_for(addr, None).fetch(&request(None)).await,
        Err(TransportError::Decode(_))
    ));

    let (addr, _) = fixed_backend(200, r#"{"releaseKey":"r1","configurations":"[1,2]"}"#).await;
    assert!(matches!(
        fetcher_for(addr, None).fetch(&request(None)).await,
        Err(TransportError::Decode(_))
    ));
}

#[tokio::test]
async fn test_authorization_header_is_sent() {
    let (addr, seen) = fixed_backend(200, r#"{"releaseKey":"r1","configurations":{}}"#).await;
    fetcher_for(addr, Some("Bearer secret-token"))
        .fetch(&request(None))
        .await
        .unwrap();

    let head = seen.lock().unwrap()[0].to_lowercase();
    assert!(head.contains("authorization: bearer secret-token"));
}

#[tokio::test]
async fn test_connection_refused_is_unreachable() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    assert!(matches!(
        fetcher_for(addr, None).fetch(&request(None)).await,
        Err(TransportError::Unreachable(_))
    ));
}

#[tokio::test]
async fn test_client_over_http() {
    let release = Arc::new(Mutex::new(r#"{"releaseKey":"r1","configurations":{"timeout":"30"}}"#));
    let current = release.clone();
    let addr = start_programmable_backend(move |_| {
        let body = current.lock().unwrap().to_string();
        async move { (200, body) }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), &["application"]);
    config.app.config_server_url = format!("http://{}", addr);
    let client = ConfigClient::new(config).unwrap();

    client.start().await;
    assert_eq!(client.get("application", "timeout", "10"), "30");

    *release.lock().unwrap() = r#"{"releaseKey":"r2","configurations":{"timeout":"45"}}"#;
    assert!(
        wait_until(Duration::from_secs(3), || client.get("application", "timeout", "10") == "45").await
    );
    client.stop().await;
}
