//! Media URL recognition.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref MEDIA_URL: Regex = Regex::new(
        r"(?i)^https?://[^\s]+\.(m3u8|mp4|mkv|flv|avi|mov|ts|webm|mp3|m4a|aac|flac)(\?[^\s]*)?$"
    )
    .expect("media url regex");
    static ref MEDIA_IN_PAGE: Regex = Regex::new(
        r#"(?i)https?:(?:\\?/){2}[^\s"'<>]+?\.(?:m3u8|mp4|mkv|flv|webm)(?:\?[^\s"'<>]*)?"#
    )
    .expect("media in page regex");
}

/// True when `url` points straight at a media file or HLS playlist.
pub fn is_video_format(url: &str) -> bool {
    MEDIA_URL.is_match(url.trim())
}

/// Media URLs found in a page body, in document order. JSON-escaped slashes are unescaped.
pub fn find_media_urls(body: &str) -> Vec<String> {
    MEDIA_IN_PAGE
        .find_iter(body)
        .map(|m| m.as_str().replace("\\/", "/"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_media_files() {
        assert!(is_video_format("https://cdn.example.com/hls/index.m3u8"));
        assert!(is_video_format("http://cdn.example.com/v/ep1.MP4?token=abc"));
        assert!(!is_video_format("https://example.com/play/123.html"));
        assert!(!is_video_format("magnet:?xt=urn:btih:abc"));
    }

    #[test]
    fn finds_media_in_html_and_json() {
        let body = r#"<video src="https://a.example.com/x.m3u8"></video>
            <script>var cfg = {"url":"https:\/\/b.example.com\/y.mp4?k=1"};</script>"#;
        let found = find_media_urls(body);
        assert_eq!(
            found,
            vec![
                "https://a.example.com/x.m3u8".to_string(),
                "https://b.example.com/y.mp4?k=1".to_string()
            ]
        );
    }
}
