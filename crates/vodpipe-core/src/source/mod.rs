//! Playable-reference resolution through an ordered extractor chain.
//!
//! The resolver owns the extractor list for its lifetime. Routing is
//! first-match-wins in registration order; unmatched references pass through
//! unchanged.

pub mod error;
pub mod extractor;
pub mod extractors;
pub mod gate;
pub mod link;
pub mod sniffer;

pub use error::ExtractError;
pub use extractor::{Extractor, ExtractorKind};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::ExtractorConfig;
use crate::net::HttpTransport;
use extractors::{EngineExtractor, PushExtractor, SniffExtractor, ThunderExtractor, VideoExtractor};

/// Whether the player must still detect the stream format itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    #[default]
    None,
    NeedsSniff,
}

/// Something the player can attempt to open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayableReference {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub parse_mode: ParseMode,
}

impl PlayableReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }
}

/// Ordered extractor registry.
#[derive(Clone, Default)]
pub struct SourceResolver {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl std::fmt::Debug for SourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.extractors.iter().map(|e| e.name()).collect();
        f.debug_struct("SourceResolver")
            .field("extractors", &names)
            .finish()
    }
}

impl SourceResolver {
    pub fn new(extractors: Vec<Arc<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    /// Built-in chain: push, thunder, engine (when supplied), video, sniff.
    pub fn with_defaults(
        cfg: &ExtractorConfig,
        transport: Arc<dyn HttpTransport>,
        engine: Option<Arc<EngineExtractor>>,
    ) -> Self {
        let mut extractors: Vec<Arc<dyn Extractor>> =
            vec![Arc::new(PushExtractor), Arc::new(ThunderExtractor)];
        if let Some(engine) = engine {
            extractors.push(engine);
        }
        extractors.push(Arc::new(VideoExtractor));
        extractors.push(Arc::new(SniffExtractor::new(cfg, transport)));
        Self::new(extractors)
    }

    pub fn extractors(&self) -> &[Arc<dyn Extractor>] {
        &self.extractors
    }

    /// First extractor matching the URL's scheme and host.
    pub fn find(&self, url: &str) -> Option<&Arc<dyn Extractor>> {
        let scheme = link::scheme(url);
        let host = link::host(url);
        self.extractors.iter().find(|e| e.matches(&scheme, &host))
    }

    /// Resolve a reference through the first matching extractor.
    pub async fn fetch(&self, reference: &PlayableReference) -> Result<PlayableReference, ExtractError> {
        let Some(extractor) = self.find(&reference.url) else {
            let parse_mode = if sniffer::is_video_format(&reference.url) {
                ParseMode::NeedsSniff
            } else {
                ParseMode::None
            };
            return Ok(reference.clone().with_parse_mode(parse_mode));
        };

        tracing::debug!(extractor = extractor.name(), url = %reference.url, "resolving");
        let url = extractor.fetch(&reference.url).await?;
        let parse_mode = match extractor.kind() {
            ExtractorKind::GenericVideo => ParseMode::NeedsSniff,
            ExtractorKind::Resolving => ParseMode::None,
        };
        Ok(PlayableReference {
            url,
            headers: reference.headers.clone(),
            parse_mode,
        })
    }

    /// Release every extractor's blocking state.
    pub fn stop_all(&self) {
        for extractor in &self.extractors {
            extractor.stop();
        }
    }

    /// Tear down every extractor on a background thread. Fire-and-forget.
    pub fn exit_all(&self) -> JoinHandle<()> {
        let extractors = self.extractors.clone();
        tokio::task::spawn_blocking(move || {
            for extractor in &extractors {
                extractor.exit();
            }
            tracing::debug!(count = extractors.len(), "extractors exited");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        scheme: &'static str,
        result: &'static str,
        stops: AtomicUsize,
        exits: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, scheme: &'static str, result: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                scheme,
                result,
                stops: AtomicUsize::new(0),
                exits: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Extractor for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn matches(&self, scheme: &str, _host: &str) -> bool {
            scheme == self.scheme
        }

        async fn fetch(&self, _url: &str) -> Result<String, ExtractError> {
            Ok(self.result.to_string())
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.exits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn second_registered_extractor_wins_for_its_scheme() {
        let first = Fixed::new("first", "magnet", "from-first");
        let second = Fixed::new("second", "cloudlink", "from-second");
        let third = Fixed::new("third", "ftp", "from-third");
        let resolver = SourceResolver::new(vec![first, second, third]);

        let resolved = resolver
            .fetch(&PlayableReference::new("cloudlink://x"))
            .await
            .unwrap();
        assert_eq!(resolved.url, "from-second");
        assert_eq!(resolved.parse_mode, ParseMode::None);
    }

    #[tokio::test]
    async fn magnet_uri_reaches_its_extractor() {
        let magnet = Fixed::new("magnet", "magnet", "http://127.0.0.1:9999/file.mkv");
        let resolver = SourceResolver::new(vec![Fixed::new("a", "cloudlink", "a"), magnet]);

        let resolved = resolver
            .fetch(&PlayableReference::new("magnet:?xt=urn:btih:abc"))
            .await
            .unwrap();
        assert_eq!(resolved.url, "http://127.0.0.1:9999/file.mkv");
    }

    #[tokio::test]
    async fn first_registered_wins_on_overlap() {
        let a = Fixed::new("a", "cloudlink", "a");
        let b = Fixed::new("b", "cloudlink", "b");
        let resolver = SourceResolver::new(vec![a, b]);
        for _ in 0..5 {
            let resolved = resolver
                .fetch(&PlayableReference::new("cloudlink://x"))
                .await
                .unwrap();
            assert_eq!(resolved.url, "a");
        }
    }

    #[tokio::test]
    async fn unmatched_reference_passes_through() {
        let resolver = SourceResolver::new(vec![Fixed::new("a", "cloudlink", "a")]);
        let mut headers = HashMap::new();
        headers.insert("Referer".to_string(), "https://example.com/".to_string());

        let media = PlayableReference::new("https://cdn.example.com/a/index.m3u8").with_headers(headers.clone());
        let resolved = resolver.fetch(&media).await.unwrap();
        assert_eq!(resolved.url, media.url);
        assert_eq!(resolved.headers, headers);
        assert_eq!(resolved.parse_mode, ParseMode::NeedsSniff);

        let page = PlayableReference::new("https://www.example.com/play/12.html");
        let resolved = resolver.fetch(&page).await.unwrap();
        assert_eq!(resolved.parse_mode, ParseMode::None);
    }

    #[tokio::test]
    async fn generic_video_keeps_needs_sniff() {
        let resolver = SourceResolver::new(vec![Arc::new(VideoExtractor)]);
        let resolved = resolver
            .fetch(&PlayableReference::new("video://https://cdn.example.com/v.mp4"))
            .await
            .unwrap();
        assert_eq!(resolved.url, "https://cdn.example.com/v.mp4");
        assert_eq!(resolved.parse_mode, ParseMode::NeedsSniff);
    }

    #[tokio::test]
    async fn stop_and_exit_fan_out() {
        let a = Fixed::new("a", "x", "a");
        let b = Fixed::new("b", "y", "b");
        let resolver = SourceResolver::new(vec![a.clone(), b.clone()]);
        resolver.stop_all();
        resolver.exit_all().await.unwrap();
        for e in [&a, &b] {
            assert_eq!(e.stops.load(Ordering::SeqCst), 1);
            assert_eq!(e.exits.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn default_chain_order() {
        struct NoHttp;
        impl HttpTransport for NoHttp {
            fn execute(&self, _request: &crate::net::HttpRequest) -> anyhow::Result<String> {
                anyhow::bail!("offline")
            }
        }
        let resolver = SourceResolver::with_defaults(&ExtractorConfig::default(), Arc::new(NoHttp), None);
        let names: Vec<&str> = resolver.extractors().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["push", "thunder", "video", "sniff"]);
    }
}
