//! Token sanitization for storage keys and CSS class names.
//!
//! Fund identifiers and category labels arrive as free text and end up in
//! three sensitive positions: S3 object keys, filenames, and CSS class
//! attributes. [`sanitize_token`] reduces any input to a conservative
//! `[A-Za-z0-9_]` token that is safe in all three. The transform is
//! idempotent, so sanitizing an already-sanitized value is a no-op.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters we refuse outright: anything that is not a word character,
/// hyphen, or whitespace.
static FORBIDDEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s\-]").expect("valid regex"));

/// Runs of hyphens and whitespace collapse to a single underscore.
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-]+").expect("valid regex"));

/// Reduce free text to a filesystem- and URL-safe token.
///
/// Strips everything outside word characters, hyphens and whitespace, then
/// collapses each run of hyphens/whitespace to one `_` and trims leading and
/// trailing underscores.
///
/// ```
/// use slide_parser_api::sanitize::sanitize_token;
///
/// assert_eq!(sanitize_token("Global Growth Fund (2024)"), "Global_Growth_Fund_2024");
/// assert_eq!(sanitize_token("already_safe"), "already_safe");
/// ```
pub fn sanitize_token(raw: &str) -> String {
    let stripped = FORBIDDEN.replace_all(raw, "");
    let collapsed = SEPARATORS.replace_all(&stripped, "_");
    collapsed.trim_matches('_').to_string()
}
