//! Tests for the service admin client
//!
//! Covers `src/services/service_admin.rs` against a local axum router
//! standing in for the server's administrative API.

mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use zato_quickstart::bootstrapper::provision;
use zato_quickstart::config::service::ServiceAdminConfig;
use zato_quickstart::config::SettingsSource;
use zato_quickstart::error::ServiceError;
use zato_quickstart::services::{GateOutcome, HttpServiceAdmin, ServiceAdmin};

async fn invoke(headers: HeaderMap, Json(body): Json<Value>) -> StatusCode {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    if !authorized {
        return StatusCode::UNAUTHORIZED;
    }
    if body["service"] != "zato.server.get-by-name" {
        return StatusCode::BAD_REQUEST;
    }

    let known_cluster = body["request"]["cluster_name"] == "quickstart";
    match body["request"]["name"].as_str() {
        Some("broken") => StatusCode::INTERNAL_SERVER_ERROR,
        Some(name) if known_cluster && name.starts_with("server") => StatusCode::OK,
        _ => StatusCode::NOT_FOUND,
    }
}

/// Serve the fake admin API on an ephemeral port and return its base URL.
async fn spawn_admin_api() -> String {
    let app = Router::new().route("/zato/admin/invoke", post(invoke));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client_for(url: &str) -> HttpServiceAdmin {
    let source = SettingsSource::from_pairs([
        ("ZATO_ADMIN_API_URL", url),
        ("ZATO_ADMIN_INVOKE_PASSWORD", "invoke-secret"),
    ]);
    let config = ServiceAdminConfig::from_source(&source)
        .unwrap()
        .expect("service admin configured");
    HttpServiceAdmin::new(&config).unwrap()
}

// ============================================================================
// Client
// ============================================================================

#[tokio::test]
async fn known_server_is_visible() {
    let url = spawn_admin_api().await;
    let client = client_for(&url);

    assert!(client.server_visible("quickstart", "server1").await.unwrap());
}

#[tokio::test]
async fn unknown_server_is_not_visible_yet() {
    let url = spawn_admin_api().await;
    let client = client_for(&url);

    assert!(!client.server_visible("other", "server1").await.unwrap());
    assert!(!client.server_visible("quickstart", "ghost").await.unwrap());
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_tolerated() {
    let url = spawn_admin_api().await;
    let client = client_for(&format!("{}/", url));

    assert!(client.server_visible("quickstart", "server1").await.unwrap());
}

#[tokio::test]
async fn server_errors_are_reported_with_status() {
    let url = spawn_admin_api().await;
    let client = client_for(&url);

    let err = client.server_visible("quickstart", "broken").await.unwrap_err();
    assert!(matches!(err, ServiceError::Status { status: 500, .. }));
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    // Bind and drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{}", addr));
    let err = client.server_visible("quickstart", "server1").await.unwrap_err();
    assert!(matches!(err, ServiceError::Http(_)));
}

// ============================================================================
// Through the pipeline
// ============================================================================

#[tokio::test]
async fn quickstart_confirms_servers_through_admin_api() {
    let url = spawn_admin_api().await;
    let dir = common::temp_dir();
    let config = common::config_with(
        dir.path(),
        &[
            ("ZATO_ADMIN_API_URL", url.as_str()),
            ("ZATO_SERVICE_MAX_WAIT_SECS", "1"),
        ],
    );

    let outcome = provision(&config, Arc::new(AtomicBool::new(false)))
        .await
        .unwrap();

    assert!(matches!(outcome, GateOutcome::Provisioned(ref r) if r.is_success()));
}

#[tokio::test]
async fn invisible_server_fails_provisioning() {
    let url = spawn_admin_api().await;
    let dir = common::temp_dir();
    let config = common::config_with(
        dir.path(),
        &[
            ("ZATO_ADMIN_API_URL", url.as_str()),
            ("ZATO_SERVICE_MAX_WAIT_SECS", "0.3"),
            ("ZATO_SERVER_NAMES", "ghost"),
        ],
    );

    let err = provision(&config, Arc::new(AtomicBool::new(false)))
        .await
        .unwrap_err();

    assert_eq!(err.step(), Some("server-cluster"));
    assert_eq!(err.exit_code(), 5);
    assert!(!config.gate.marker_path.exists());
}
