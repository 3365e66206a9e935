//! Scheme/host extraction and download-link decoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Lowercased scheme of `url`: the text before the first `:`, so `magnet:?xt=...`
/// has scheme `magnet`. "" when there is none.
pub fn scheme(url: &str) -> String {
    match url.trim().split_once(':') {
        Some((scheme, _)) if is_scheme(scheme) => scheme.to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Lowercased host of `url` ("" when it does not parse or has no host).
pub fn host(url: &str) -> String {
    url::Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Host matches `pattern` exactly or as a subdomain of it.
pub fn host_matches(host: &str, pattern: &str) -> bool {
    let pattern = pattern.trim().trim_start_matches("*.").to_ascii_lowercase();
    if pattern.is_empty() {
        return false;
    }
    host == pattern || host.ends_with(&format!(".{}", pattern))
}

const THUNDER: &str = "thunder://";
const FLASHGET: &str = "flashget://";
const QQDL: &str = "qqdl://";

/// True for thunder/flashget/qqdl links that wrap another URL in base64.
pub fn is_wrapped_link(url: &str) -> bool {
    matches!(scheme(url).as_str(), "thunder" | "flashget" | "qqdl")
}

fn strip_prefix_ignore_case<'a>(url: &'a str, prefix: &str) -> Option<&'a str> {
    let head = url.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &url[prefix.len()..])
}

fn decode_payload(payload: &str) -> Option<String> {
    let payload = payload.trim().trim_end_matches('/');
    let bytes = STANDARD.decode(payload).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode a wrapped download link to the URL it carries.
///
/// - `thunder://` + base64("AA" + url + "ZZ")
/// - `flashget://` + base64("[FLASHGET]" + url + "[FLASHGET]"), optionally followed by `&...`
/// - `qqdl://` + base64(url)
pub fn decode_wrapped_link(url: &str) -> Option<String> {
    let url = url.trim();
    if let Some(payload) = strip_prefix_ignore_case(url, THUNDER) {
        let inner = decode_payload(payload)?;
        let inner = inner.strip_prefix("AA").unwrap_or(&inner);
        let inner = inner.strip_suffix("ZZ").unwrap_or(inner);
        return Some(inner.trim().to_string()).filter(|s| !s.is_empty());
    }
    if let Some(payload) = strip_prefix_ignore_case(url, FLASHGET) {
        let payload = payload.split('&').next().unwrap_or(payload);
        let inner = decode_payload(payload)?;
        let inner = inner.trim_start_matches("[FLASHGET]").trim_end_matches("[FLASHGET]");
        return Some(inner.trim().to_string()).filter(|s| !s.is_empty());
    }
    if let Some(payload) = strip_prefix_ignore_case(url, QQDL) {
        return decode_payload(payload)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
    }
    None
}

/// Last path segment of `url`, used to name episodes produced from bare links.
pub fn file_name(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(prefix: &str, inner: &str) -> String {
        format!("{}{}", prefix, STANDARD.encode(inner))
    }

    #[test]
    fn scheme_and_host() {
        assert_eq!(scheme("HTTP://Example.com/a.mp4"), "http");
        assert_eq!(host("HTTP://Example.com/a.mp4"), "example.com");
        assert_eq!(scheme("tvbus://abcdef"), "tvbus");
        assert_eq!(host("tvbus://abcdef"), "abcdef");
        assert_eq!(scheme("magnet:?xt=urn:btih:abc"), "magnet");
        assert_eq!(scheme(" Ed2k:|file|a.mkv|"), "ed2k");
        assert_eq!(scheme("/relative/path"), "");
        assert_eq!(scheme("./a:b"), "");
        assert_eq!(scheme("127.0.0.1:8080/a"), "");
        assert_eq!(host("not a url"), "");
    }

    #[test]
    fn host_matching_allows_subdomains() {
        assert!(host_matches("v.example.com", "example.com"));
        assert!(host_matches("example.com", "*.example.com"));
        assert!(!host_matches("badexample.com", "example.com"));
        assert!(!host_matches("example.com", ""));
    }

    #[test]
    fn decodes_thunder_link() {
        let link = wrap(THUNDER, "AAhttp://dl.example.com/movie.mkvZZ");
        assert!(is_wrapped_link(&link));
        assert_eq!(
            decode_wrapped_link(&link).as_deref(),
            Some("http://dl.example.com/movie.mkv")
        );
    }

    #[test]
    fn decodes_flashget_with_suffix() {
        let link = format!(
            "{}&abc",
            wrap(FLASHGET, "[FLASHGET]http://dl.example.com/a.mp4[FLASHGET]")
        );
        assert_eq!(
            decode_wrapped_link(&link).as_deref(),
            Some("http://dl.example.com/a.mp4")
        );
    }

    #[test]
    fn decodes_qqdl_and_rejects_garbage() {
        let link = wrap(QQDL, "http://dl.example.com/b.mp4");
        assert_eq!(
            decode_wrapped_link(&link).as_deref(),
            Some("http://dl.example.com/b.mp4")
        );
        assert_eq!(decode_wrapped_link("thunder://!!!"), None);
        assert_eq!(decode_wrapped_link("http://example.com/"), None);
    }

    #[test]
    fn file_name_from_path() {
        assert_eq!(
            file_name("http://example.com/dir/ep01.mp4?x=1").as_deref(),
            Some("ep01.mp4")
        );
        assert_eq!(file_name("http://example.com/"), None);
    }
}
