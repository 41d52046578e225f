use base64::{Engine as _, prelude::BASE64_STANDARD};

/// Entities the portal actually emits, in replacement order.
///
/// `&amp;` comes after the markup entities so `&amp;lt;` decodes to the
/// literal text `&lt;` and not to `<`.
const ENTITIES: [(&str, &str); 6] = [
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&amp;", "&"),
    ("&nbsp;", " "),
];

/// Decodes the six named entities the portal uses in titles and names.
pub fn decode_html(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    ENTITIES
        .iter()
        .fold(input.to_string(), |text, (entity, literal)| {
            text.replace(entity, literal)
        })
}

/// Decodes a base64 text field (notice bodies). Returns an empty string on
/// any malformed input.
pub fn decode_base64_text(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let bytes = match BASE64_STANDARD.decode(trimmed) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to decode base64 field: {e}");
            return String::new();
        }
    };
    String::from_utf8(bytes).unwrap_or_else(|e| {
        tracing::warn!("Base64 field is not valid UTF-8: {e}");
        String::new()
    })
}
