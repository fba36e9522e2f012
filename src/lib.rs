//! # slide-parser-api
//!
//! A small web backend that turns an uploaded PDF slide deck into
//! categorized, S3-hosted slide images plus ready-to-paste HTML.
//!
//! ## Flow
//!
//! ```text
//! POST /api/upload                          POST /api/process
//!  │                                         │
//!  ├─ validate multipart (file, fund fields) ├─ validate selections
//!  ├─ rasterize pages via pdfium             ├─ take session (atomic, single use)
//!  ├─ encode thumbnails (≤300x200 data-URIs) ├─ upload full-res PNGs to S3
//!  └─ park deck in the session store ────────┴─ group by category, emit HTML
//! ```
//!
//! The two requests are bridged by the in-memory [`session::SessionStore`],
//! the only stateful piece of the service. Sessions are single use (atomic
//! take), expire after a TTL, and the store is capacity-bounded; state does
//! not survive a restart and is not shared across processes.
//!
//! Rasterization ([`pipeline::render::Rasterizer`]) and object storage
//! ([`storage::ObjectStorage`]) sit behind traits. Production binds pdfium
//! and the AWS S3 SDK; tests exercise the full router with stand-ins.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use slide_parser_api::{app, AppConfig, AppState, PdfiumRasterizer, S3Storage};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::from_env();
//!     let storage = Arc::new(S3Storage::new(&config.storage));
//!     let state = AppState::new(config, storage, Arc::new(PdfiumRasterizer));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await.unwrap();
//!     axum::serve(listener, app(state)).await.unwrap();
//! }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod error;
pub mod html;
pub mod pipeline;
pub mod sanitize;
pub mod session;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{app, AppState, ProcessResponse, StoredSlide, UploadResponse};
pub use config::{AppConfig, StorageConfig, MAX_UPLOAD_BYTES};
pub use error::ApiError;
pub use pipeline::render::{PdfiumRasterizer, Rasterizer, RenderError};
pub use session::{Session, SessionStore, Slide};
pub use storage::{MemoryStorage, ObjectStorage, S3Storage, StorageError};
