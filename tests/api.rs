//! Integration tests driving the full router through `tower::oneshot`.
//!
//! The rasterizer and storage seams are replaced with in-process stand-ins,
//! so these tests cover everything from multipart parsing down to HTML
//! assembly without pdfium or AWS credentials.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use image::{DynamicImage, Rgba, RgbaImage};
use serde_json::{json, Value};
use slide_parser_api::{
    app, AppConfig, AppState, MemoryStorage, ObjectStorage, Rasterizer, RenderError, S3Storage,
    StorageConfig, StorageError,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

const BOUNDARY: &str = "test-boundary-7d93a1";

// ── Test doubles ──────────────────────────────────────────────────────────

/// Returns a fixed number of synthetic 640x480 pages for any input.
struct StubRasterizer {
    pages: usize,
}

impl Rasterizer for StubRasterizer {
    fn rasterize(&self, _: &Path, _: u32) -> Result<Vec<DynamicImage>, RenderError> {
        Ok((0..self.pages)
            .map(|i| {
                DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                    640,
                    480,
                    Rgba([(i * 40) as u8, 80, 160, 255]),
                ))
            })
            .collect())
    }
}

/// Every put fails with a transport error.
struct FailingStorage;

#[async_trait::async_trait]
impl ObjectStorage for FailingStorage {
    fn is_configured(&self) -> bool {
        true
    }
    fn bucket(&self) -> Option<&str> {
        Some("broken-bucket")
    }
    async fn put(&self, _: &str, _: Vec<u8>, _: &str) -> Result<String, StorageError> {
        Err(StorageError::Transport {
            detail: "connection reset by peer".into(),
        })
    }
}

/// Every put stalls until the handler's timeout fires.
struct HangingStorage;

#[async_trait::async_trait]
impl ObjectStorage for HangingStorage {
    fn is_configured(&self) -> bool {
        true
    }
    fn bucket(&self) -> Option<&str> {
        Some("tarpit")
    }
    async fn put(&self, _: &str, _: Vec<u8>, _: &str) -> Result<String, StorageError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        unreachable!("put should have been timed out")
    }
}

// ── Harness ───────────────────────────────────────────────────────────────

struct TestCtx {
    app: Router,
    state: AppState,
    storage: Arc<MemoryStorage>,
}

fn test_config() -> AppConfig {
    AppConfig {
        storage_timeout: Duration::from_millis(200),
        ..AppConfig::default()
    }
}

fn ctx_with(pages: usize, config: AppConfig) -> TestCtx {
    let storage = Arc::new(MemoryStorage::new("test-bucket"));
    let state = AppState::new(config, storage.clone(), Arc::new(StubRasterizer { pages }));
    TestCtx {
        app: app(state.clone()),
        state,
        storage,
    }
}

fn ctx(pages: usize) -> TestCtx {
    ctx_with(pages, test_config())
}

fn ctx_with_storage(pages: usize, storage: Arc<dyn ObjectStorage>) -> TestCtx {
    // MemoryStorage handle kept separately is irrelevant here; keep a dummy.
    let state = AppState::new(test_config(), storage, Arc::new(StubRasterizer { pages }));
    TestCtx {
        app: app(state.clone()),
        state,
        storage: Arc::new(MemoryStorage::new("unused")),
    }
}

fn multipart_upload(file: Option<(&str, &[u8])>, fund_id: &str, fund_name: &str) -> Request<Body> {
    let mut body = Vec::new();
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in [("fund_id", fund_id), ("fund_name", fund_name)] {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .uri("/api/upload")
        .method("POST")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request builds")
}

fn process_request(body: Value) -> Request<Body> {
    Request::builder()
        .uri("/api/process")
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("infallible service");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn upload_deck(ctx: &TestCtx) -> Value {
    let (status, body) = send(
        &ctx.app,
        multipart_upload(Some(("deck.pdf", b"%PDF-1.4 stub")), "F123", "Global Growth Fund"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "upload failed: {body}");
    body
}

// ── Info endpoints ────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_healthy() {
    let ctx = ctx(1);
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request builds");
    let (status, body) = send(&ctx.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["platform"].is_string());
}

#[tokio::test]
async fn home_lists_endpoints() {
    let ctx = ctx(1);
    let request = Request::builder()
        .uri("/")
        .body(Body::empty())
        .expect("request builds");
    let (status, body) = send(&ctx.app, request).await;

    assert_eq!(status, StatusCode::OK);
    let endpoints = body["endpoints"].as_array().expect("endpoint list");
    assert!(endpoints.iter().any(|e| e.as_str().unwrap().contains("/api/upload")));
    assert!(endpoints.iter().any(|e| e.as_str().unwrap().contains("/api/process")));
}

#[tokio::test]
async fn api_test_reports_storage_presence() {
    let configured = ctx(1);
    let request = Request::builder()
        .uri("/api/test")
        .body(Body::empty())
        .expect("request builds");
    let (_, body) = send(&configured.app, request).await;
    assert_eq!(body["aws_configured"], json!(true));

    let unconfigured = ctx_with_storage(1, Arc::new(S3Storage::new(&StorageConfig::default())));
    let request = Request::builder()
        .uri("/api/test")
        .body(Body::empty())
        .expect("request builds");
    let (_, body) = send(&unconfigured.app, request).await;
    assert_eq!(body["aws_configured"], json!(false));
}

// ── Upload stage ──────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_produces_one_slide_per_page() {
    let ctx = ctx(3);
    let body = upload_deck(&ctx).await;

    assert_eq!(body["success"], json!(true));
    assert_eq!(body["total_slides"], json!(3));
    assert_eq!(body["fund_id"], "F123");
    assert_eq!(body["fund_name"], "Global Growth Fund");

    let slides = body["slides"].as_array().expect("slides array");
    assert_eq!(slides.len(), 3);
    for (idx, slide) in slides.iter().enumerate() {
        assert_eq!(slide["id"], json!(idx + 1));
        assert_eq!(slide["title"], format!("Slide {}", idx + 1));
        assert_eq!(slide["selected"], json!(false));
        assert!(slide["category"].is_null());

        // Thumbnails must decode and fit 300x200.
        let uri = slide["thumbnail"].as_str().expect("thumbnail string");
        let b64 = uri.strip_prefix("data:image/png;base64,").expect("data uri");
        let thumb = image::load_from_memory(&STANDARD.decode(b64).expect("valid base64"))
            .expect("decodable thumbnail");
        assert!(thumb.width() <= 300 && thumb.height() <= 200);
    }

    assert_eq!(ctx.state.sessions.len(), 1, "one session created");
}

#[tokio::test]
async fn upload_without_file_is_rejected() {
    let ctx = ctx(3);
    let (status, body) = send(&ctx.app, multipart_upload(None, "F1", "Fund")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
    assert!(ctx.state.sessions.is_empty());
}

#[tokio::test]
async fn upload_rejects_non_pdf_extension() {
    let ctx = ctx(3);
    let (status, body) = send(
        &ctx.app,
        multipart_upload(Some(("deck.pptx", b"junk")), "F1", "Fund"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Only PDF files"));
}

#[tokio::test]
async fn upload_requires_fund_fields() {
    let ctx = ctx(3);
    let (status, body) = send(
        &ctx.app,
        multipart_upload(Some(("deck.pdf", b"%PDF-1.4")), "  ", "Fund"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "fund_id is required");

    let (status, body) = send(
        &ctx.app,
        multipart_upload(Some(("deck.pdf", b"%PDF-1.4")), "F1", ""),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "fund_name is required");
}

#[tokio::test]
async fn oversized_upload_is_413_and_creates_no_session() {
    let config = AppConfig {
        max_upload_bytes: 1024,
        ..test_config()
    };
    let ctx = ctx_with(3, config);
    let big = vec![0u8; 4096];
    let (status, body) = send(
        &ctx.app,
        multipart_upload(Some(("deck.pdf", &big)), "F1", "Fund"),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].as_str().unwrap().contains("too large"));
    assert!(ctx.state.sessions.is_empty());
}

#[tokio::test]
async fn empty_rasterization_is_processing_failure() {
    let ctx = ctx(0);
    let (status, body) = send(
        &ctx.app,
        multipart_upload(Some(("deck.pdf", b"%PDF-1.4")), "F1", "Fund"),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to process PDF");
    assert!(ctx.state.sessions.is_empty());
}

// ── Process stage ─────────────────────────────────────────────────────────

#[tokio::test]
async fn process_validates_input() {
    let ctx = ctx(3);

    let (status, body) = send(&ctx.app, process_request(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "session_id is required");

    let (status, body) = send(
        &ctx.app,
        process_request(json!({"session_id": "abc", "selected_slides": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No slides selected");
}

#[tokio::test]
async fn process_unknown_session_is_404() {
    let ctx = ctx(3);
    let (status, body) = send(
        &ctx.app,
        process_request(json!({
            "session_id": "00000000-0000-0000-0000-000000000000",
            "selected_slides": [{"id": 1, "category": "intro"}],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Session not found");
}

#[tokio::test]
async fn round_trip_groups_by_category_in_selection_order() {
    let ctx = ctx(3);
    let uploaded = upload_deck(&ctx).await;
    let session_id = uploaded["session_id"].as_str().expect("session id");

    let (status, body) = send(
        &ctx.app,
        process_request(json!({
            "session_id": session_id,
            "selected_slides": [
                {"id": 1, "category": "intro"},
                {"id": 2, "category": "body"},
                {"id": 3, "category": "body"},
            ],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "process failed: {body}");
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["total_uploaded"], json!(3));
    assert_eq!(body["storage_bucket"], "test-bucket");

    let groups = body["uploaded_slides"].as_object().expect("grouped map");
    assert_eq!(groups.len(), 2, "exactly intro and body: {body}");
    assert_eq!(groups["intro"].as_array().unwrap().len(), 1);
    let body_slides = groups["body"].as_array().unwrap();
    assert_eq!(body_slides.len(), 2);
    assert_eq!(body_slides[0]["id"], json!(2), "selection order preserved");
    assert_eq!(body_slides[1]["id"], json!(3));

    // Keys carry the sanitized fund tokens and land in storage.
    let key = body_slides[0]["s3_key"].as_str().unwrap();
    assert_eq!(
        key,
        format!("sessions/{session_id}/F123_Global_Growth_Fund_slide_2.png")
    );
    assert!(ctx.storage.get(key).is_some(), "object stored under {key}");
    assert_eq!(ctx.storage.object_count(), 3);

    let sections = body["html_sections"].as_object().expect("html map");
    assert_eq!(sections.len(), 2);
    let html = sections["body"].as_str().unwrap();
    assert!(html.contains("<h2>body</h2>"));
    assert_eq!(html.matches("slide-item").count(), 2);
}

#[tokio::test]
async fn consumed_session_is_gone() {
    let ctx = ctx(2);
    let uploaded = upload_deck(&ctx).await;
    let session_id = uploaded["session_id"].as_str().expect("session id");
    let request = json!({
        "session_id": session_id,
        "selected_slides": [{"id": 1, "category": "intro"}],
    });

    let (status, _) = send(&ctx.app, process_request(request.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&ctx.app, process_request(request)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Session not found");
}

#[tokio::test]
async fn out_of_range_selections_are_skipped_silently() {
    let ctx = ctx(2);
    let uploaded = upload_deck(&ctx).await;
    let session_id = uploaded["session_id"].as_str().expect("session id");

    let (status, body) = send(
        &ctx.app,
        process_request(json!({
            "session_id": session_id,
            "selected_slides": [
                {"id": 1, "category": "intro"},
                {"id": 99, "category": "intro"},
                {"id": 0, "category": "intro"},
                {"id": -4, "category": "intro"},
            ],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "stale ids must not fail: {body}");
    assert_eq!(body["total_uploaded"], json!(1));
    assert_eq!(ctx.storage.object_count(), 1);
}

#[tokio::test]
async fn missing_category_defaults_to_uncategorized() {
    let ctx = ctx(1);
    let uploaded = upload_deck(&ctx).await;
    let session_id = uploaded["session_id"].as_str().expect("session id");

    let (status, body) = send(
        &ctx.app,
        process_request(json!({
            "session_id": session_id,
            "selected_slides": [{"id": 1}],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["uploaded_slides"]["uncategorized"].is_array(), "{body}");
}

#[tokio::test]
async fn storage_failure_names_the_slide() {
    let ctx = ctx_with_storage(2, Arc::new(FailingStorage));
    let uploaded = upload_deck(&ctx).await;
    let session_id = uploaded["session_id"].as_str().expect("session id");

    let (status, body) = send(
        &ctx.app,
        process_request(json!({
            "session_id": session_id,
            "selected_slides": [{"id": 2, "category": "body"}],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("slide 2"), "got: {error}");
}

#[tokio::test]
async fn stalled_storage_hits_the_timeout() {
    let ctx = ctx_with_storage(1, Arc::new(HangingStorage));
    let uploaded = upload_deck(&ctx).await;
    let session_id = uploaded["session_id"].as_str().expect("session id");

    let (status, body) = send(
        &ctx.app,
        process_request(json!({
            "session_id": session_id,
            "selected_slides": [{"id": 1, "category": "intro"}],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("timed out"));
}

#[tokio::test]
async fn unconfigured_storage_is_a_distinct_error() {
    let ctx = ctx_with_storage(1, Arc::new(S3Storage::new(&StorageConfig::default())));
    let uploaded = upload_deck(&ctx).await;
    let session_id = uploaded["session_id"].as_str().expect("session id").to_string();

    let (status, body) = send(
        &ctx.app,
        process_request(json!({
            "session_id": session_id,
            "selected_slides": [{"id": 1, "category": "intro"}],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("not configured"));
    // The precondition failed before the take, so the session survives.
    assert!(ctx.state.sessions.contains(&session_id));
}

#[tokio::test]
async fn racing_process_requests_consume_the_session_once() {
    let ctx = ctx(2);
    let uploaded = upload_deck(&ctx).await;
    let session_id = uploaded["session_id"].as_str().expect("session id");
    let request = json!({
        "session_id": session_id,
        "selected_slides": [{"id": 1, "category": "intro"}],
    });

    let (a, b) = tokio::join!(
        ctx.app.clone().oneshot(process_request(request.clone())),
        ctx.app.clone().oneshot(process_request(request.clone())),
    );
    let mut statuses = [
        a.expect("infallible").status(),
        b.expect("infallible").status(),
    ];
    statuses.sort();

    assert_eq!(
        statuses,
        [StatusCode::OK, StatusCode::NOT_FOUND],
        "exactly one winner"
    );
    assert_eq!(ctx.storage.object_count(), 1, "loser uploaded nothing");
}
