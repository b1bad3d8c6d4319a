//! Router tests against a temp artifact root and the in-memory queue.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vscribe_api::{create_router, ApiConfig, AppState};
use vscribe_models::{ArtifactKind, Stem};
use vscribe_queue::JobQueue;
use vscribe_storage::{ArtifactStore, Catalog};

const BOUNDARY: &str = "vscribe-test-boundary";

struct TestApp {
    _dir: TempDir,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let catalog = Arc::new(Catalog::in_memory().unwrap());
        let store = ArtifactStore::new(dir.path()).with_catalog(catalog);
        let queue = JobQueue::in_memory(Duration::from_secs(600));
        let state = AppState::new(ApiConfig::default(), store, queue);
        Self { _dir: dir, state }
    }

    fn router(&self) -> Router {
        create_router(self.state.clone(), None)
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.send(request).await;
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    async fn upload(&self, filename: &str, bytes: &[u8]) -> Value {
        let (status, json) = self.send_json(upload_request(filename, bytes)).await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json
    }
}

fn upload_request(filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: video/mp4\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/videos")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_and_ready() {
    let app = TestApp::new();

    let (status, json) = app.send_json(get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");

    let (status, json) = app.send_json(get("/ready")).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["checks"]["queue"]["status"], "ok");
    assert_eq!(json["checks"]["storage"]["status"], "ok");
}

#[tokio::test]
async fn upload_list_fetch_and_delete_video() {
    let app = TestApp::new();
    let uploaded = app.upload("holiday.mp4", b"fake-video").await;

    let stem = uploaded["stem"].as_str().unwrap().to_string();
    assert!(stem.ends_with("-holiday"));
    assert_eq!(uploaded["artifact"]["path"], format!("videos/{stem}.mp4"));
    let id = uploaded["video"]["id"].as_i64().unwrap();

    let (status, json) = app.send_json(get("/api/videos")).await;
    assert_eq!(status, StatusCode::OK);
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["filename"], "holiday.mp4");
    assert_eq!(rows[0]["stem"], stem.as_str());

    let (status, body) = app.send(get(&format!("/api/videos/{stem}/file"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"fake-video");

    let (status, _) = app.send(delete(&format!("/api/videos/{id}"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = app.send_json(delete(&format!("/api/videos/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "not_found");

    let (_, json) = app.send_json(get("/api/videos")).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn upload_without_file_is_rejected() {
    let app = TestApp::new();
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--{BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/videos")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, json) = app.send_json(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "bad_request");
}

#[tokio::test]
async fn stage_with_missing_input_is_conflict() {
    let app = TestApp::new();
    let uploaded = app.upload("v1.mp4", b"video").await;
    let stem = uploaded["stem"].as_str().unwrap();

    let (status, json) = app
        .send_json(post(&format!("/api/stages/transcribe/{stem}")))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "source_not_found");
    assert!(json["detail"].as_str().unwrap().contains("audio"));
    assert_eq!(app.state.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_stage_is_bad_request() {
    let app = TestApp::new();
    let (status, json) = app.send_json(post("/api/stages/dance/v1")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "bad_request");
}

#[tokio::test]
async fn enqueue_then_poll_pending_job() {
    let app = TestApp::new();
    let uploaded = app.upload("v1.mp4", b"video").await;
    let stem = uploaded["stem"].as_str().unwrap();

    let (status, json) = app
        .send_json(post(&format!("/api/stages/extract-audio/{stem}")))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{json}");
    assert_eq!(json["stage"], "extract-audio");
    assert_eq!(json["stem"], stem);
    let handle = json["job_handle"].as_str().unwrap().to_string();

    let (status, json) = app.send_json(get(&format!("/api/jobs/{handle}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["job_handle"], handle.as_str());
    assert_eq!(json["state"], "pending");
    assert_eq!(json["attempts"], 0);
    assert!(json.get("result").is_none());
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn unknown_job_handle_is_not_found() {
    let app = TestApp::new();
    let (status, json) = app.send_json(get("/api/jobs/no-such-job")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "not_found");
}

#[tokio::test]
async fn artifact_get_and_delete() {
    let app = TestApp::new();
    let stem = Stem::parse("1700000000000-v1").unwrap();
    app.state
        .store
        .write(ArtifactKind::WordCloudImage, &stem, b"\x89PNG")
        .await
        .unwrap();

    let response = app
        .router()
        .oneshot(get(&format!("/api/artifacts/word-cloud-image/{stem}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    let (status, body) = app.send(get(&format!("/api/wordclouds/{stem}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"\x89PNG");

    let uri = format!("/api/artifacts/word-cloud-image/{stem}");
    let (status, _) = app.send(delete(&uri)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = app.send_json(get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "not_found");

    let (status, _) = app.send(delete(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn translated_text_variant_is_served() {
    let app = TestApp::new();
    let stem = Stem::parse("1700000000000-v1").unwrap();
    app.state
        .store
        .write_variant(ArtifactKind::Translated, &stem, "txt", "1\nhello\n")
        .await
        .unwrap();

    let response = app
        .router()
        .oneshot(get(&format!("/api/artifacts/translated/{stem}?ext=txt")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );

    let (status, _) = app
        .send(get(&format!("/api/artifacts/translated/{stem}?ext=exe")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_kind_and_bad_stem_are_bad_requests() {
    let app = TestApp::new();

    let (status, _) = app.send(get("/api/artifacts/podcast/v1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send(get("/api/audios/..%2Fetc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/health")
        .header("X-Request-ID", "abc-123")
        .body(Body::empty())
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "abc-123");
}
