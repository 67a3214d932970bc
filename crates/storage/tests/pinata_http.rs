use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use deedchain_storage::{
    content_id_for, PinataClient, PinataCredentials, StorageClient, StorageError,
};
use deedchain_types::{ContentId, PinnedFile, PropertyManifest};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Default)]
struct Recorded {
    file_uploads: Vec<(String, Option<String>, Vec<u8>, String)>,
    json_pins: Vec<Value>,
    auth_headers: Vec<(Option<String>, Option<String>, Option<String>)>,
}

#[derive(Clone, Default)]
struct MockPinataState {
    recorded: Arc<RwLock<Recorded>>,
}

struct MockPinataServer {
    address: String,
    state: MockPinataState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockPinataServer {
    async fn start() -> Self {
        let state = MockPinataState::default();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock pinata listener");
        let addr = listener.local_addr().expect("listener addr lookup");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let app = Router::new()
            .route("/pinning/pinFileToIPFS", post(pin_file))
            .route("/pinning/pinJSONToIPFS", post(pin_json))
            .route("/broken/pinning/pinFileToIPFS", post(broken))
            .route("/broken/pinning/pinJSONToIPFS", post(broken))
            .with_state(state.clone());

        tokio::spawn(async move {
            let server = axum::serve(listener, app);
            let graceful = server.with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            let _ = graceful.await;
        });

        Self {
            address: format!("http://{}", addr),
            state,
            shutdown: Some(shutdown_tx),
        }
    }
}

impl Drop for MockPinataServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn record_auth(state: &MockPinataState, headers: &HeaderMap) {
    state.recorded.write().auth_headers.push((
        header(headers, "pinata_api_key"),
        header(headers, "pinata_secret_api_key"),
        header(headers, "authorization"),
    ));
}

async fn pin_file(
    State(state): State<MockPinataState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, StatusCode> {
    record_auth(&state, &headers);

    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut metadata = String::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        if name == "file" {
            file = Some((name, file_name, bytes.to_vec()));
        } else if name == "pinataMetadata" {
            metadata = String::from_utf8_lossy(&bytes).to_string();
        }
    }

    let (name, file_name, bytes) = file.ok_or(StatusCode::BAD_REQUEST)?;
    let cid = content_id_for(&bytes);
    state
        .recorded
        .write()
        .file_uploads
        .push((name, file_name, bytes.clone(), metadata));
    Ok(Json(json!({
        "IpfsHash": cid.as_str(),
        "PinSize": bytes.len(),
        "Timestamp": "2024-05-01T10:20:30.123Z"
    })))
}

async fn pin_json(
    State(state): State<MockPinataState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    record_auth(&state, &headers);
    let content = serde_json::to_vec(&body["pinataContent"]).unwrap_or_default();
    let cid = content_id_for(&content);
    state.recorded.write().json_pins.push(body);
    Json(json!({ "IpfsHash": cid.as_str(), "PinSize": content.len() }))
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::UNAUTHORIZED, "{\"error\":\"invalid api key\"}")
}

fn api_key_client(base: &str) -> PinataClient {
    PinataClient::new(
        base,
        PinataCredentials::ApiKey {
            api_key: "key-123".to_string(),
            secret_api_key: "secret-456".to_string(),
        },
    )
    .unwrap()
}

fn manifest() -> PropertyManifest {
    PropertyManifest {
        property_id: "prop-9".to_string(),
        owner_name: "Grace Hopper".to_string(),
        property_kind: "commercial".to_string(),
        property_name: "Dock 4".to_string(),
        documents: vec![PinnedFile {
            name: "survey.pdf".to_string(),
            document_kind: "application/pdf".to_string(),
            content_id: ContentId::new("QmSurvey").unwrap(),
        }],
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 30).unwrap(),
    }
}

#[tokio::test]
async fn test_pin_file_sends_multipart_with_metadata() {
    let server = MockPinataServer::start().await;
    let client = api_key_client(&server.address);

    let cid = client.pin_file("deed.pdf", b"%PDF deed").await.unwrap();
    assert_eq!(cid, content_id_for(b"%PDF deed"));

    let recorded = server.state.recorded.read().clone();
    let (part, file_name, bytes, metadata) = &recorded.file_uploads[0];
    assert_eq!(part, "file");
    assert_eq!(file_name.as_deref(), Some("deed.pdf"));
    assert_eq!(bytes, b"%PDF deed");
    assert_eq!(
        serde_json::from_str::<Value>(metadata).unwrap(),
        json!({"name": "deed.pdf"})
    );
    assert_eq!(
        recorded.auth_headers[0],
        (Some("key-123".to_string()), Some("secret-456".to_string()), None)
    );
}

#[tokio::test]
async fn test_pin_manifest_wraps_content_and_name() {
    let server = MockPinataServer::start().await;
    let client = api_key_client(&server.address);
    let manifest = manifest();

    let first = client.pin_manifest(&manifest).await.unwrap();
    let second = client.pin_manifest(&manifest).await.unwrap();
    assert_eq!(first, second);

    let recorded = server.state.recorded.read().clone();
    assert_eq!(recorded.json_pins.len(), 2);
    let body = &recorded.json_pins[0];
    assert_eq!(body["pinataMetadata"]["name"], "metadata-prop-9-1714558830000");
    assert_eq!(body["pinataContent"]["propertyOwnerName"], "Grace Hopper");
    assert_eq!(body["pinataContent"]["propertyType"], "commercial");
    assert_eq!(body["pinataContent"]["documents"][0]["cid"], "QmSurvey");
    assert_eq!(body["pinataContent"]["timestamp"], "2024-05-01T10:20:30.000Z");
    assert_eq!(recorded.json_pins[0], recorded.json_pins[1]);
}

#[tokio::test]
async fn test_jwt_uses_bearer_header() {
    let server = MockPinataServer::start().await;
    let client = PinataClient::new(
        &server.address,
        PinataCredentials::Jwt("jwt-token".to_string()),
    )
    .unwrap();

    client.pin_file("a.txt", b"a").await.unwrap();
    let recorded = server.state.recorded.read().clone();
    assert_eq!(
        recorded.auth_headers[0],
        (None, None, Some("Bearer jwt-token".to_string()))
    );
}

#[tokio::test]
async fn test_rejected_pin_is_pin_failed() {
    let server = MockPinataServer::start().await;
    let client = api_key_client(&format!("{}/broken", server.address));

    let err = client.pin_file("deed.pdf", b"x").await.unwrap_err();
    match &err {
        StorageError::PinFailed { target, cause } => {
            assert_eq!(target, "deed.pdf");
            assert!(cause.contains("401"));
            assert!(cause.contains("invalid api key"));
        }
        other => panic!("expected PinFailed, got {other:?}"),
    }

    let err = client.pin_manifest(&manifest()).await.unwrap_err();
    assert!(matches!(err, StorageError::PinFailed { .. }));
}

#[tokio::test]
async fn test_unreachable_service_is_pin_failed() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = api_key_client(&format!("http://127.0.0.1:{port}"));
    let err = client.pin_file("deed.pdf", b"x").await.unwrap_err();
    assert!(matches!(err, StorageError::PinFailed { .. }));
}
