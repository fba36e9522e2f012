//! HTTP surface: router, request/response types, and the two pipeline
//! handlers (upload, process).
//!
//! Handlers stay thin: parse and validate, call into the pipeline / session
//! store / storage adapter, shape the response. All state is shared through
//! [`AppState`], and the rasterizer and storage live behind traits so tests
//! drive the full router without pdfium or AWS credentials.

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::html::{category_section, SlideRef};
use crate::pipeline::{self, render::Rasterizer};
use crate::session::{SessionStore, Slide};
use crate::storage::{ObjectStorage, StorageError};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Slack on top of the upload limit for multipart framing and the two form
/// fields, so the body limit rejects only genuinely oversized files.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Shared per-request state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub rasterizer: Arc<dyn Rasterizer>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStorage>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(
            config.session_ttl,
            config.session_capacity,
        ));
        Self {
            config: Arc::new(config),
            sessions,
            storage,
            rasterizer,
        }
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/api/test", get(api_status))
        .route("/api/upload", post(upload))
        .route("/api/process", post(process))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Response types ────────────────────────────────────────────────────────

/// Successful upload: the session id plus everything the client needs to
/// render the selection UI.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub session_id: String,
    pub slides: Vec<Slide>,
    pub fund_id: String,
    pub fund_name: String,
    pub total_slides: usize,
}

/// One uploaded slide as reported back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct StoredSlide {
    pub id: u32,
    pub filename: String,
    pub s3_url: String,
    pub s3_key: String,
}

/// Successful process: stored slides and HTML, both grouped by category.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub uploaded_slides: HashMap<String, Vec<StoredSlide>>,
    pub html_sections: HashMap<String, String>,
    pub storage_bucket: String,
    pub total_uploaded: usize,
}

/// Body of `POST /api/process`. Fields are optional so that missing input
/// surfaces as a structured 400 instead of a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub session_id: Option<String>,
    pub selected_slides: Option<Vec<SlideSelection>>,
}

/// One caller selection: which slide, under which category.
#[derive(Debug, Deserialize)]
pub struct SlideSelection {
    /// 1-based slide id. Ids outside the session's range are skipped, since
    /// the client list may reference stale state.
    pub id: Option<i64>,
    pub category: Option<String>,
}

// ── Info endpoints ────────────────────────────────────────────────────────

async fn home() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Slide Parser API is running!",
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/health - Health check",
            "/api/test - API status",
            "/api/upload - Upload PDF files",
            "/api/process - Upload selected slides and generate HTML",
        ],
    }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy", "platform": "rust" }))
}

/// Reports whether storage credentials are present, without a network call.
async fn api_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Slide Parser API is working!",
        "aws_configured": state.storage.is_configured(),
    }))
}

// ── Upload stage ──────────────────────────────────────────────────────────

/// `POST /api/upload`: multipart form with `file`, `fund_id`, `fund_name`.
///
/// Validation order: file present, filename non-empty, `.pdf` extension,
/// size limit, then the fund fields. On success the deck is rasterized from
/// a scoped temp file (removed on every exit path by `TempDir` drop) and a
/// session is created.
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let max_mib = (state.config.max_upload_bytes / (1024 * 1024)) as u64;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut fund_id = String::new();
    let mut fund_name = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_mib))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, max_mib))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("fund_id") => {
                fund_id = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, max_mib))?;
            }
            Some("fund_name") => {
                fund_name = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, max_mib))?;
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| ApiError::Validation("No file provided".into()))?;
    if filename.is_empty() {
        return Err(ApiError::Validation("No file selected".into()));
    }
    if !has_pdf_extension(&filename) {
        return Err(ApiError::Validation(
            "Invalid file type. Only PDF files are allowed.".into(),
        ));
    }
    if bytes.len() > state.config.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge { max_mib });
    }
    let fund_id = fund_id.trim().to_string();
    let fund_name = fund_name.trim().to_string();
    if fund_id.is_empty() {
        return Err(ApiError::Validation("fund_id is required".into()));
    }
    if fund_name.is_empty() {
        return Err(ApiError::Validation("fund_name is required".into()));
    }

    info!("upload: {filename} ({} bytes) for fund {fund_id}", bytes.len());

    let temp_dir = tempfile::TempDir::new()
        .map_err(|e| ApiError::Internal(format!("failed to create temp dir: {e}")))?;
    let pdf_path = temp_dir.path().join("upload.pdf");
    tokio::fs::write(&pdf_path, &bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to write temp file: {e}")))?;

    let (slides, images) = pipeline::rasterize_deck(
        state.rasterizer.clone(),
        pdf_path,
        state.config.dpi,
        state.config.thumbnail_max,
    )
    .await?;

    let total_slides = slides.len();
    let session_id = state
        .sessions
        .create(slides.clone(), images, &fund_id, &fund_name);
    info!("upload: session {session_id} created with {total_slides} slide(s)");

    Ok(Json(UploadResponse {
        success: true,
        session_id,
        slides,
        fund_id,
        fund_name,
        total_slides,
    }))
}

/// Case-insensitive check that the filename ends in `.pdf` with a non-empty
/// stem.
fn has_pdf_extension(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    lower.ends_with(".pdf") && lower.len() > 4
}

fn multipart_error(e: axum::extract::multipart::MultipartError, max_mib: u64) -> ApiError {
    if e.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { max_mib }
    } else {
        ApiError::Validation(format!("Malformed multipart body: {e}"))
    }
}

// ── Process stage ─────────────────────────────────────────────────────────

/// `POST /api/process`: spend a session by uploading the selected slides.
///
/// The session is removed with an atomic take *before* any upload starts, so
/// of two racing requests exactly one proceeds and the other sees 404. The
/// existence check runs first purely for error precedence: an unknown
/// session reports 404 even when storage is also unconfigured.
///
/// Uploads are sequential in selection order and all-or-nothing at the
/// response level: the first failure aborts with the failing slide id.
/// Objects already uploaded are not rolled back; bucket lifecycle rules are
/// expected to clean up such leftovers.
async fn process(
    State(state): State<AppState>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|e| ApiError::Validation(format!("Invalid JSON body: {e}")))?;

    let session_id = request
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("session_id is required".into()))?;
    let selections = request
        .selected_slides
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("No slides selected".into()))?;

    if !state.sessions.contains(session_id) {
        return Err(ApiError::SessionNotFound);
    }
    if !state.storage.is_configured() {
        return Err(ApiError::StorageNotConfigured);
    }
    let session = state
        .sessions
        .take(session_id)
        .ok_or(ApiError::SessionNotFound)?;

    let mut uploaded: HashMap<String, Vec<StoredSlide>> = HashMap::new();
    let mut total_uploaded = 0usize;

    for selection in &selections {
        let id = match selection.id {
            Some(id) if id >= 1 && (id as usize) <= session.images.len() => id as u32,
            other => {
                debug!(
                    "skipping selection {other:?}: outside 1..={}",
                    session.images.len()
                );
                continue;
            }
        };
        let category = selection
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("uncategorized")
            .to_string();

        let filename = format!(
            "{}_{}_slide_{id}.png",
            session.fund_id_safe, session.fund_name_safe
        );
        let key = format!("sessions/{}/{filename}", session.id);
        let bytes = session.images[(id - 1) as usize].clone();

        let put = state.storage.put(&key, bytes, "image/png");
        let url = match tokio::time::timeout(state.config.storage_timeout, put).await {
            Err(_) => {
                return Err(ApiError::StorageUpload {
                    slide_id: id,
                    detail: StorageError::Timeout {
                        secs: state.config.storage_timeout.as_secs(),
                    }
                    .to_string(),
                })
            }
            Ok(Err(StorageError::NotConfigured)) => return Err(ApiError::StorageNotConfigured),
            Ok(Err(e)) => {
                return Err(ApiError::StorageUpload {
                    slide_id: id,
                    detail: e.to_string(),
                })
            }
            Ok(Ok(url)) => url,
        };

        uploaded.entry(category).or_default().push(StoredSlide {
            id,
            filename,
            s3_url: url,
            s3_key: key,
        });
        total_uploaded += 1;
    }

    let html_sections: HashMap<String, String> = uploaded
        .iter()
        .map(|(category, slides)| {
            let refs: Vec<SlideRef> = slides
                .iter()
                .map(|s| SlideRef {
                    id: s.id,
                    url: s.s3_url.clone(),
                })
                .collect();
            (category.clone(), category_section(category, &refs))
        })
        .collect();

    info!(
        "process: session {} consumed, {total_uploaded} slide(s) uploaded",
        session.id
    );

    Ok(Json(ProcessResponse {
        success: true,
        uploaded_slides: uploaded,
        html_sections,
        storage_bucket: state.storage.bucket().unwrap_or_default().to_string(),
        total_uploaded,
    }))
}
