//! Attachment discovery in portal detail pages.
//!
//! Pages are scanned positionally: the caller finds a literal marker and
//! hands a bounded window of the text after it to [`extract_attachment`].
//! This keeps scan cost flat on large pages and tolerates broken markup.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::decode::decode_html;
use crate::link::{absolutize, unwrap_preview_url};
use crate::model::Attachment;

/// Bytes scanned after a marker.
pub const ATTACHMENT_WINDOW: usize = 2048;

pub const DEFAULT_ATTACHMENT_NAME: &str = "Attachment";

/// `href` fragments that identify a file link.
const FILE_LINK_HINTS: [&str; 4] = ["downloadFile", "openNewWindow", "fileId=", "wjid="];

static ANCHOR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").expect("Failed to parse anchor regex")
});
static HREF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#)
        .expect("Failed to parse href regex")
});
static TITLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)title\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#)
        .expect("Failed to parse title regex")
});
static SIBLING_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<[a-z][a-z0-9]*\b[^>]*\bclass\s*=\s*["'][^"']*\bftitle\b[^"']*["'][^>]*>(.*?)</"#)
        .expect("Failed to parse sibling name regex")
});
static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("Failed to parse tag regex"));

/// Returns at most [`ATTACHMENT_WINDOW`] bytes following the first
/// occurrence of `marker`, cut short at the first of `stops` inside it.
pub fn window_after<'a>(html: &'a str, marker: &str, stops: &[&str]) -> Option<&'a str> {
    let start = html.find(marker)? + marker.len();
    let mut end = (start + ATTACHMENT_WINDOW).min(html.len());
    while !html.is_char_boundary(end) {
        end -= 1;
    }
    let window = &html[start..end];
    let cut = stops
        .iter()
        .filter(|stop| !stop.is_empty())
        .filter_map(|stop| window.find(stop))
        .min()
        .unwrap_or(window.len());
    Some(&window[..cut])
}

/// Finds the marker in `html` and extracts the attachment that follows it,
/// without reading past the next of `stops`.
pub fn attachment_after(
    html: &str,
    marker: &str,
    stops: &[&str],
    base: &Url,
) -> Option<Attachment> {
    window_after(html, marker, stops).and_then(|window| extract_attachment(window, base))
}

/// Extracts the first file link of an HTML fragment.
pub fn extract_attachment(fragment: &str, base: &Url) -> Option<Attachment> {
    let (attrs, inner) = ANCHOR_REGEX.captures_iter(fragment).find_map(|caps| {
        let attrs = caps.get(1)?.as_str();
        let href = attribute(&HREF_REGEX, attrs)?;
        FILE_LINK_HINTS
            .iter()
            .any(|hint| href.contains(hint))
            .then(|| (attrs, caps.get(2).map_or("", |m| m.as_str())))
    })?;

    let href = decode_html(&attribute(&HREF_REGEX, attrs)?);
    let absolute = absolutize(base, &href)?;
    let download_url = unwrap_preview_url(&absolute, base);

    let mut name = strip_tags(inner);
    if name.chars().count() < 2 {
        if let Some(title) = attribute(&TITLE_REGEX, attrs).filter(|t| !t.trim().is_empty()) {
            name = title.trim().to_string();
        }
    }
    if name.is_empty() {
        name = SIBLING_NAME_REGEX
            .captures(fragment)
            .and_then(|caps| caps.get(1))
            .map(|m| strip_tags(m.as_str()))
            .unwrap_or_default();
    }
    if name.is_empty() {
        name = DEFAULT_ATTACHMENT_NAME.to_string();
    }

    Some(Attachment {
        name: decode_html(&name),
        download_url,
    })
}

fn attribute(regex: &Regex, attrs: &str) -> Option<String> {
    let caps = regex.captures(attrs)?;
    (1..=3)
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().to_string())
}

fn strip_tags(html: &str) -> String {
    TAG_REGEX.replace_all(html, "").trim().to_string()
}
