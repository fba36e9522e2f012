//! Error types for the slide-parser API.
//!
//! One taxonomy covers the whole request path. Each variant carries enough
//! context to produce an actionable message, and [`ApiError::status`] fixes
//! the HTTP status it maps to:
//!
//! | Variant | Status |
//! |---------|--------|
//! | [`ApiError::Validation`] | 400 |
//! | [`ApiError::PayloadTooLarge`] | 413 |
//! | [`ApiError::SessionNotFound`] | 404 |
//! | everything else | 500 |
//!
//! Every error response body is a JSON object with a single human-readable
//! `error` field. Internal detail (storage transport errors, pdfium output)
//! is logged via `tracing` at the point of failure and never echoed to the
//! caller verbatim beyond the variant message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// All errors surfaced by the upload and process endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    // ── Client errors ─────────────────────────────────────────────────────
    /// Bad or missing request input.
    #[error("{0}")]
    Validation(String),

    /// Upload exceeds the configured size limit.
    #[error("File too large. Maximum size is {max_mib} MiB.")]
    PayloadTooLarge { max_mib: u64 },

    /// The session id is unknown, expired, or already consumed.
    #[error("Session not found")]
    SessionNotFound,

    // ── Server errors ─────────────────────────────────────────────────────
    /// Storage credentials or bucket name are missing from the environment.
    #[error("Storage is not configured. Set AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY and S3_BUCKET_NAME.")]
    StorageNotConfigured,

    /// Rasterization produced no pages (malformed or unsupported PDF).
    #[error("Failed to process PDF")]
    ProcessingFailed,

    /// A storage upload failed; names the slide so the caller can retry.
    #[error("Failed to upload slide {slide_id}: {detail}")]
    StorageUpload { slide_id: u32, detail: String },

    /// Unexpected internal failure.
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::SessionNotFound => StatusCode::NOT_FOUND,
            ApiError::StorageNotConfigured
            | ApiError::ProcessingFailed
            | ApiError::StorageUpload { .. }
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!("internal error: {detail}");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
