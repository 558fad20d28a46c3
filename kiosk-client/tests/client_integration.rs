// kiosk-client/tests/client_integration.rs
// Integration tests against a local axum fake backend

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use kiosk_client::{ApiResponse, ClientConfig, ClientError, HttpClient, SettingsRecord, Snapshot};
use shared::{AuditEntry, EventType, SettingValue};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct FakeBackend {
    audit: Mutex<Vec<AuditEntry>>,
    settings: Mutex<Option<SettingsRecord>>,
    backup: Mutex<Option<Snapshot>>,
}

type Shared = Arc<FakeBackend>;

async fn append_audit(
    State(backend): State<Shared>,
    Json(entry): Json<AuditEntry>,
) -> Json<ApiResponse<()>> {
    if entry.payload.get("malformed").is_some() {
        return Json(ApiResponse::error("E0002", "payload rejected"));
    }
    backend.audit.lock().unwrap().push(entry);
    Json(ApiResponse::ack())
}

async fn get_settings(
    State(backend): State<Shared>,
) -> Result<Json<ApiResponse<SettingsRecord>>, StatusCode> {
    match backend.settings.lock().unwrap().clone() {
        Some(record) => Ok(Json(ApiResponse::ok(record))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn put_settings(
    State(backend): State<Shared>,
    Json(record): Json<SettingsRecord>,
) -> Json<ApiResponse<()>> {
    *backend.settings.lock().unwrap() = Some(record);
    Json(ApiResponse::ack())
}

async fn put_backup(
    State(backend): State<Shared>,
    Json(snapshot): Json<Snapshot>,
) -> Json<ApiResponse<()>> {
    *backend.backup.lock().unwrap() = Some(snapshot);
    Json(ApiResponse::ack())
}

async fn slow_health() -> Json<ApiResponse<()>> {
    tokio::time::sleep(Duration::from_millis(500)).await;
    Json(ApiResponse::ack())
}

async fn spawn_backend() -> (String, Shared) {
    let backend: Shared = Arc::new(FakeBackend::default());
    let app = Router::new()
        .route("/api/audit", post(append_audit))
        .route("/api/settings", get(get_settings).post(put_settings))
        .route("/api/backup", post(put_backup))
        .route("/api/health", get(slow_health))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), backend)
}

fn client(base_url: &str) -> HttpClient {
    ClientConfig::new(base_url)
        .with_token("device-token")
        .build_http_client()
        .unwrap()
}

#[tokio::test]
async fn test_append_audit_delivers_entry() {
    let (url, backend) = spawn_backend().await;
    let client = client(&url);

    let entry = AuditEntry::new(
        EventType::PackageRecorded,
        serde_json::json!({ "package_id": "P-1" }),
    );
    client.append_audit(&entry).await.unwrap();

    let received = backend.audit.lock().unwrap().clone();
    assert_eq!(received, vec![entry]);
}

#[tokio::test]
async fn test_rejected_envelope_is_not_transient() {
    let (url, _backend) = spawn_backend().await;
    let client = client(&url);

    let entry = AuditEntry::new(EventType::ScanRejected, serde_json::json!({ "malformed": true }));
    let err = client.append_audit(&entry).await.unwrap_err();

    assert!(matches!(err, ClientError::Rejected { .. }), "got {err:?}");
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_settings_missing_then_replaced() {
    let (url, _backend) = spawn_backend().await;
    let client = client(&url);

    assert!(client.fetch_settings().await.unwrap().is_none());

    let mut record = SettingsRecord::default();
    record
        .values
        .insert("station_name".to_string(), SettingValue::from("Line 4"));
    record.recent_operators = vec!["ana".to_string()];
    client.replace_settings(&record).await.unwrap();

    assert_eq!(client.fetch_settings().await.unwrap(), Some(record));
}

#[tokio::test]
async fn test_backup_overwrites() {
    let (url, backend) = spawn_backend().await;
    let client = client(&url);

    let mut first = Snapshot::default();
    first
        .collections
        .insert("packages".to_string(), serde_json::json!([1]));
    let mut second = first.clone();
    second
        .collections
        .insert("packages".to_string(), serde_json::json!([1, 2]));

    client.push_backup(&first).await.unwrap();
    client.push_backup(&second).await.unwrap();

    assert_eq!(backend.backup.lock().unwrap().clone(), Some(second));
}

#[tokio::test]
async fn test_health_check_times_out() {
    let (url, _backend) = spawn_backend().await;
    let mut config = ClientConfig::new(&url);
    config.health_timeout_ms = 100;
    let client = config.build_http_client().unwrap();

    let err = client.health().await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout), "got {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unreachable_backend_is_transient() {
    // Bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(&format!("http://{addr}"));
    let entry = AuditEntry::new(EventType::AppStarted, serde_json::Value::Null);
    let err = client.append_audit(&entry).await.unwrap_err();

    assert!(err.is_transient(), "got {err:?}");
}
