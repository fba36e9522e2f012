//! PDF rasterization: every page of an uploaded deck to a `DynamicImage`.
//!
//! The pdfium C++ library does the actual rendering. It keeps thread-local
//! state and must never be called from an async context, so the pdfium path
//! only runs inside `spawn_blocking` (see [`super::rasterize_deck`]).
//!
//! Rasterization sits behind the [`Rasterizer`] trait for one reason: the
//! HTTP layer and its tests should not need a pdfium shared library on the
//! machine. Tests substitute a stub that returns synthetic pages.

use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Failures while turning a PDF into page images.
///
/// All of these collapse to a generic "processing failed" at the API
/// boundary; the variants exist so logs say which stage actually broke.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No pdfium shared library could be bound.
    #[error("failed to bind pdfium library: {0}\nInstall pdfium or set PDFIUM_DYNAMIC_LIB_PATH.")]
    BindingFailed(String),

    /// The file could not be parsed as a PDF.
    #[error("could not open PDF: {detail}")]
    CorruptPdf { detail: String },

    /// A page failed to render. No partial output: the whole deck fails.
    #[error("rasterization failed for page {page}: {detail}")]
    PageFailed { page: usize, detail: String },
}

/// Converts a PDF file into an ordered sequence of full-page raster images.
///
/// Implementations are blocking; callers are responsible for keeping them off
/// the async runtime threads.
pub trait Rasterizer: Send + Sync {
    /// Render every page at the given DPI, in page order. Either all pages
    /// render or the whole operation fails.
    fn rasterize(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<DynamicImage>, RenderError>;
}

/// The production [`Rasterizer`], backed by a system pdfium library.
#[derive(Debug, Default)]
pub struct PdfiumRasterizer;

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<DynamicImage>, RenderError> {
        let bindings = Pdfium::bind_to_system_library()
            .map_err(|e| RenderError::BindingFailed(e.to_string()))?;
        let pdfium = Pdfium::new(bindings);

        let document =
            pdfium
                .load_pdf_from_file(pdf_path, None)
                .map_err(|e| RenderError::CorruptPdf {
                    detail: format!("{e:?}"),
                })?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        // PDF points are 1/72 inch; scaling by dpi/72 renders at the target DPI.
        let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);

        let mut images = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap =
                page.render_with_config(&render_config)
                    .map_err(|e| RenderError::PageFailed {
                        page: idx + 1,
                        detail: format!("{e:?}"),
                    })?;
            let image = bitmap.as_image();
            debug!("rendered page {} at {}x{} px", idx + 1, image.width(), image.height());
            images.push(image);
        }

        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_pdf_error_mentions_detail() {
        let e = RenderError::CorruptPdf {
            detail: "bad xref".into(),
        };
        assert!(e.to_string().contains("bad xref"));
    }

    #[test]
    fn page_failed_error_is_one_based() {
        let e = RenderError::PageFailed {
            page: 3,
            detail: "render glitch".into(),
        };
        assert!(e.to_string().contains("page 3"));
    }
}
