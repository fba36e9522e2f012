//! Image encoding: full-page PNG bytes and inline thumbnail data-URIs.
//!
//! PNG on both paths. Slides are mostly rendered text and flat color, where
//! PNG stays small and keeps text crisp; the thumbnail is additionally scaled
//! into a 300x200 box before encoding so the upload response stays light even
//! for long decks.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn png_bytes(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Scale the page into `max` (width, height), preserving aspect ratio, and
/// return it as a `data:image/png;base64,` URI for inlining in JSON.
pub fn thumbnail_data_uri(
    img: &DynamicImage,
    max: (u32, u32),
) -> Result<String, image::ImageError> {
    let thumb = img.thumbnail(max.0, max.1);
    let bytes = png_bytes(&thumb)?;
    let b64 = STANDARD.encode(&bytes);
    debug!(
        "thumbnail {}x{} -> {} bytes base64",
        thumb.width(),
        thumb.height(),
        b64.len()
    );
    Ok(format!("data:image/png;base64,{b64}"))
}
