//! Extended M3U playlists.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ATTRIBUTE: Regex = Regex::new(r#"([A-Za-z0-9_-]+)="([^"]*)""#).expect("m3u attribute regex");
}

/// One `#EXTINF` entry and the URL line after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct M3uEntry {
    pub name: String,
    pub url: String,
    pub tvg_id: Option<String>,
    pub tvg_logo: Option<String>,
    pub group_title: Option<String>,
    pub catchup: Option<String>,
    pub catchup_source: Option<String>,
    pub catchup_replace: Option<String>,
    /// `http-user-agent` attribute or `#EXTVLCOPT:http-user-agent=` line.
    pub user_agent: Option<String>,
}

/// Playlist-wide settings from the `#EXTM3U` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct M3uHeader {
    /// XMLTV guides from `url-tvg`, `x-tvg-url` and `tvg-url` (comma separated).
    pub epg_urls: Vec<String>,
    pub catchup: Option<String>,
    pub catchup_source: Option<String>,
}

/// Content starts with the `#EXTM3U` header.
pub fn is_playlist(content: &str) -> bool {
    content.trim_start_matches('\u{feff}').trim_start().starts_with("#EXTM3U")
}

fn attributes(text: &str) -> impl Iterator<Item = (String, String)> + '_ {
    ATTRIBUTE
        .captures_iter(text)
        .map(|cap| (cap[1].to_ascii_lowercase(), cap[2].trim().to_string()))
}

fn non_empty(value: String) -> Option<String> {
    Some(value).filter(|v| !v.is_empty())
}

/// Header settings; default when the content has no `#EXTM3U` line.
pub fn parse_header(content: &str) -> M3uHeader {
    let mut header = M3uHeader::default();
    let Some(line) = content
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .filter(|l| l.starts_with("#EXTM3U"))
    else {
        return header;
    };
    for (key, value) in attributes(line) {
        match key.as_str() {
            "url-tvg" | "x-tvg-url" | "tvg-url" => {
                for url in value.split(',').map(str::trim).filter(|u| !u.is_empty()) {
                    if !header.epg_urls.iter().any(|u| u == url) {
                        header.epg_urls.push(url.to_string());
                    }
                }
            }
            "catchup" => header.catchup = non_empty(value),
            "catchup-source" => header.catchup_source = non_empty(value),
            _ => {}
        }
    }
    header
}

fn parse_extinf(line: &str) -> M3uEntry {
    let body = line.trim_start_matches("#EXTINF:");
    let (attrs, name) = match body.rfind(',') {
        Some(pos) => (&body[..pos], body[pos + 1..].trim()),
        None => (body, ""),
    };
    let mut entry = M3uEntry {
        name: name.to_string(),
        ..M3uEntry::default()
    };
    for (key, value) in attributes(attrs) {
        match key.as_str() {
            "tvg-id" => entry.tvg_id = Some(value),
            "tvg-logo" => entry.tvg_logo = Some(value),
            "group-title" => entry.group_title = Some(value),
            "catchup" => entry.catchup = non_empty(value),
            "catchup-source" => entry.catchup_source = non_empty(value),
            "catchup-replace" => entry.catchup_replace = non_empty(value),
            "http-user-agent" => entry.user_agent = non_empty(value),
            _ => {}
        }
    }
    entry
}

fn vlc_user_agent(line: &str) -> Option<String> {
    let value = line.strip_prefix("#EXTVLCOPT:http-user-agent=")?;
    non_empty(value.trim().trim_matches('"').to_string())
}

/// Entries in playlist order. An `#EXTINF` without a following URL is dropped.
pub fn parse(content: &str) -> Vec<M3uEntry> {
    let mut entries = Vec::new();
    let mut pending: Option<M3uEntry> = None;
    for line in content.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if line.starts_with("#EXTINF:") {
            pending = Some(parse_extinf(line));
        } else if line.starts_with('#') {
            if let (Some(entry), Some(ua)) = (pending.as_mut(), vlc_user_agent(line)) {
                entry.user_agent = Some(ua);
            }
        } else if let Some(mut entry) = pending.take() {
            entry.url = line.to_string();
            entries.push(entry);
        }
    }
    entries
}
