use url::Url;

/// Path fragments that mark a preview wrapper around the real download URL.
const PREVIEW_PATH_MARKERS: [&str; 2] = ["opennewwindow", "preview"];

/// Resolves a possibly relative link against the portal origin.
pub fn absolutize(base: &Url, link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    base.join(link).ok().map(String::from)
}

/// Turns a preview link into the download URL it wraps.
///
/// Anything that does not look like a preview link with a `downloadUrl`
/// parameter comes back untouched.
pub fn unwrap_preview_url(url: &str, base: &Url) -> String {
    let Ok(parsed) = base.join(url) else {
        return url.to_string();
    };
    let path = parsed.path().to_ascii_lowercase();
    if !PREVIEW_PATH_MARKERS
        .iter()
        .any(|marker| path.contains(marker))
    {
        return url.to_string();
    }
    let Some(target) = parsed
        .query_pairs()
        .find(|(key, _)| key == "downloadUrl")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
    else {
        return url.to_string();
    };

    if is_absolute_http(&target) {
        target
    } else {
        absolutize(base, &target).unwrap_or(target)
    }
}

fn is_absolute_http(link: &str) -> bool {
    let lower = link.get(..8).unwrap_or(link).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
