//! HTML assembly for categorized slide sections.
//!
//! Pure functions: stored-slide references in, markup text out. The category
//! label and alt text are caller-supplied free text, so everything
//! interpolated into the markup goes through [`escape_html`]; class
//! attributes instead use the sanitized token form, since CSS classes cannot
//! carry arbitrary escaped text.

use crate::sanitize::sanitize_token;

/// A slide reference as it appears in generated markup.
#[derive(Debug, Clone)]
pub struct SlideRef {
    /// 1-based page index within the originating deck.
    pub id: u32,
    /// Publicly resolvable image URL.
    pub url: String,
}

/// Escape the five HTML-significant characters for safe interpolation into
/// element text and attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build one HTML section for a category and its slides, in list order.
///
/// The container class derives from the sanitized category so stylesheets can
/// target sections; the heading and captions show the raw (escaped) label.
pub fn category_section(category: &str, slides: &[SlideRef]) -> String {
    let class_token = sanitize_token(category).to_lowercase();
    let class_name = if class_token.is_empty() {
        "uncategorized".to_string()
    } else {
        class_token
    };
    let label = escape_html(category);

    let mut html = String::new();
    html.push_str(&format!(
        "<div class=\"slide-section slide-section-{class_name}\" data-category=\"{class_name}\">\n"
    ));
    html.push_str(&format!("  <h2>{label}</h2>\n"));
    html.push_str("  <div class=\"slides-container\">\n");
    for slide in slides {
        html.push_str(&format!(
            "    <div class=\"slide-item\">\n      <img src=\"{}\" alt=\"{} slide {}\" class=\"slide-image\">\n      <p class=\"slide-caption\">Slide {}</p>\n    </div>\n",
            escape_html(&slide.url),
            label,
            slide.id,
            slide.id,
        ));
    }
    html.push_str("  </div>\n</div>\n");
    html
}
