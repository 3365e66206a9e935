//! Built-in episode expanders.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::EpisodeExpander;
use crate::model::m3u;
use crate::model::Episode;
use crate::net::{self, HttpRequest, HttpTransport};
use crate::source::link;

/// Unwraps thunder/flashget/qqdl links into the download URL they carry.
#[derive(Debug, Default)]
pub struct ThunderLinkExpander;

#[async_trait]
impl EpisodeExpander for ThunderLinkExpander {
    fn name(&self) -> &'static str {
        "thunder"
    }

    fn matches(&self, url: &str) -> bool {
        link::is_wrapped_link(url)
    }

    async fn expand(&self, episode: &Episode) -> Result<Vec<Episode>> {
        let url = link::decode_wrapped_link(&episode.url)
            .ok_or_else(|| anyhow::anyhow!("cannot decode link for '{}'", episode.name))?;
        let name = link::file_name(&url).unwrap_or_else(|| episode.name.clone());
        Ok(vec![Episode::new(name, url)])
    }
}

/// Fans an `.m3u` playlist link out into one episode per entry.
pub struct PlaylistExpander {
    transport: Arc<dyn HttpTransport>,
}

impl PlaylistExpander {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl EpisodeExpander for PlaylistExpander {
    fn name(&self) -> &'static str {
        "playlist"
    }

    fn matches(&self, url: &str) -> bool {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        matches!(link::scheme(url).as_str(), "http" | "https") && path.to_ascii_lowercase().ends_with(".m3u")
    }

    async fn expand(&self, episode: &Episode) -> Result<Vec<Episode>> {
        let body = net::fetch_text(Arc::clone(&self.transport), HttpRequest::get(&episode.url)).await?;
        if !m3u::is_playlist(&body) {
            anyhow::bail!("{} is not an m3u playlist", episode.url);
        }
        Ok(m3u::parse(&body)
            .into_iter()
            .map(|entry| Episode::new(entry.name, entry.url))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    struct Body(&'static str);

    impl HttpTransport for Body {
        fn execute(&self, _request: &HttpRequest) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn thunder_link_becomes_named_episode() {
        let url = format!("thunder://{}", STANDARD.encode("AAhttp://dl.example.com/s01/e01.mkvZZ"));
        let expanded = ThunderLinkExpander
            .expand(&Episode::new("EP1", url))
            .await
            .unwrap();
        assert_eq!(expanded, vec![Episode::new("e01.mkv", "http://dl.example.com/s01/e01.mkv")]);
    }

    #[tokio::test]
    async fn playlist_fans_out() {
        let expander = PlaylistExpander::new(Arc::new(Body(
            "#EXTM3U\n#EXTINF:-1,Part 1\nhttps://cdn.example.com/p1.mp4\n#EXTINF:-1,Part 2\nhttps://cdn.example.com/p2.mp4\n",
        )));
        assert!(expander.matches("https://cdn.example.com/list.M3U?x=1"));
        assert!(!expander.matches("https://cdn.example.com/index.m3u8"));
        let expanded = expander
            .expand(&Episode::new("All", "https://cdn.example.com/list.m3u"))
            .await
            .unwrap();
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[1].name, "Part 2");
    }

    #[tokio::test]
    async fn non_playlist_body_fails() {
        let expander = PlaylistExpander::new(Arc::new(Body("<html>")));
        assert!(expander
            .expand(&Episode::new("All", "https://cdn.example.com/list.m3u"))
            .await
            .is_err());
    }
}
