//! Anti-forgery token extraction.
//!
//! Every mutating form needs the `CSRFToken` rendered into the page it was
//! loaded from. Tokens are single use: each submission step re-extracts
//! from the most recent page body.

use printcert_core::{ConsoleError, PROTOCOL, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Token markup shapes observed across firmware revisions, tried in order.
static TOKEN_SHAPES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let name = regex::escape(PROTOCOL.token_field);
    [
        // <input type="hidden" id="CSRFToken1" name="CSRFToken" value="..."/>
        format!(r#"(?i)<input\b[^>]*?\sname\s*=\s*["']{name}["'][^>]*?\svalue\s*=\s*["']([^"']*)["']"#),
        format!(r#"(?i)<input\b[^>]*?\svalue\s*=\s*["']([^"']*)["'][^>]*?\sname\s*=\s*["']{name}["']"#),
        // id-bound token without a name attribute
        format!(r#"(?i)<[a-z]+\b[^>]*?\sid\s*=\s*["']{name}[0-9]*["'][^>]*?\svalue\s*=\s*["']([^"']*)["']"#),
        format!(r#"(?i)<[a-z]+\b[^>]*?\svalue\s*=\s*["']([^"']*)["'][^>]*?\sid\s*=\s*["']{name}[0-9]*["']"#),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("token pattern"))
    .collect()
});

/// First non-empty token value in `html`.
///
/// A miss means the console changed shape; callers treat it as fatal.
pub fn extract_token(html: &str) -> Result<String> {
    TOKEN_SHAPES
        .iter()
        .flat_map(|re| re.captures_iter(html))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ConsoleError::ProtocolDrift(format!(
                "anti-forgery token ({}) not found in page",
                PROTOCOL.token_field
            ))
        })
}
