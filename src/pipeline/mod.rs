//! The upload pipeline: PDF file to session-ready slides.
//!
//! ```text
//! temp PDF ──▶ render ──▶ encode ──▶ (slides, full-res PNGs)
//!             (pdfium)   (png/base64)
//! ```
//!
//! 1. [`render`] — rasterize every page via the [`render::Rasterizer`] seam;
//!    pdfium is not async-safe, so this stage is blocking
//! 2. [`encode`] — full-resolution PNG bytes for later storage upload, plus a
//!    bounded thumbnail data-URI for the upload response
//!
//! [`rasterize_deck`] drives both stages inside one `spawn_blocking` call and
//! is the only entry point the HTTP layer uses.

pub mod encode;
pub mod render;

use crate::error::ApiError;
use crate::session::Slide;
use self::render::Rasterizer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Rasterize a PDF and encode its pages.
///
/// Returns slide metadata (ids `1..=N` in page order, thumbnails inlined) and
/// the index-aligned full-resolution PNG bytes. A deck that yields zero pages
/// is a processing failure, matching the all-or-nothing rasterizer contract.
pub async fn rasterize_deck(
    rasterizer: Arc<dyn Rasterizer>,
    pdf_path: PathBuf,
    dpi: u32,
    thumbnail_max: (u32, u32),
) -> Result<(Vec<Slide>, Vec<Vec<u8>>), ApiError> {
    let result = tokio::task::spawn_blocking(move || {
        let pages = rasterizer.rasterize(&pdf_path, dpi).map_err(|e| {
            warn!("rasterization failed: {e}");
            ApiError::ProcessingFailed
        })?;

        let mut slides = Vec::with_capacity(pages.len());
        let mut images = Vec::with_capacity(pages.len());
        for (idx, page) in pages.iter().enumerate() {
            let id = (idx + 1) as u32;
            let full = encode::png_bytes(page)
                .map_err(|e| ApiError::Internal(format!("PNG encoding failed: {e}")))?;
            let thumbnail = encode::thumbnail_data_uri(page, thumbnail_max)
                .map_err(|e| ApiError::Internal(format!("thumbnail encoding failed: {e}")))?;
            slides.push(Slide {
                id,
                thumbnail,
                title: format!("Slide {id}"),
                selected: false,
                category: None,
            });
            images.push(full);
        }
        Ok((slides, images))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("rasterization task panicked: {e}")))?;

    match result {
        Ok((slides, _)) if slides.is_empty() => Err(ApiError::ProcessingFailed),
        other => other,
    }
}
