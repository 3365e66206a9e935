//! Remote-page sniffing for configured hosts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::config::ExtractorConfig;
use crate::net::{self, HttpRequest, HttpTransport};
use crate::source::error::ExtractError;
use crate::source::extractor::Extractor;
use crate::source::{link, sniffer};

/// Fetches pages on configured hosts and returns the first media URL found
/// that is not served from a blocked (ad) host.
pub struct SniffExtractor {
    hosts: Vec<String>,
    blocked: Vec<String>,
    headers: HashMap<String, String>,
    transport: Arc<dyn HttpTransport>,
    stop: Mutex<CancellationToken>,
}

impl SniffExtractor {
    pub fn new(cfg: &ExtractorConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            hosts: cfg.sniff_hosts.clone(),
            blocked: cfg.blocked_hosts.clone(),
            headers: HashMap::new(),
            transport,
            stop: Mutex::new(CancellationToken::new()),
        }
    }

    /// Headers sent with every page request (e.g. Referer).
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    fn is_blocked(&self, url: &str) -> bool {
        let host = link::host(url);
        self.blocked.iter().any(|b| link::host_matches(&host, b))
    }

    fn stop_token(&self) -> CancellationToken {
        self.stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Extractor for SniffExtractor {
    fn name(&self) -> &'static str {
        "sniff"
    }

    fn matches(&self, scheme: &str, host: &str) -> bool {
        matches!(scheme, "http" | "https") && self.hosts.iter().any(|h| link::host_matches(host, h))
    }

    async fn fetch(&self, url: &str) -> Result<String, ExtractError> {
        let token = self.stop_token();
        let request = HttpRequest::get(url).headers(&self.headers);
        let page = tokio::select! {
            _ = token.cancelled() => return Err(ExtractError::Stopped),
            page = net::fetch_text(Arc::clone(&self.transport), request) => page,
        };
        let page = page.map_err(|e| ExtractError::failed(format!("page fetch failed: {:#}", e)))?;
        let found = sniffer::find_media_urls(&page)
            .into_iter()
            .find(|candidate| !self.is_blocked(candidate));
        match found {
            Some(media) => {
                tracing::debug!(page = url, media = %media, "sniffed media url");
                Ok(media)
            }
            None => Err(ExtractError::failed(format!("no playable media found on {}", url))),
        }
    }

    fn stop(&self) {
        let mut token = self.stop.lock().unwrap_or_else(PoisonError::into_inner);
        token.cancel();
        *token = CancellationToken::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct PageTransport {
        body: &'static str,
        delay: Duration,
    }

    impl HttpTransport for PageTransport {
        fn execute(&self, _request: &HttpRequest) -> anyhow::Result<String> {
            std::thread::sleep(self.delay);
            Ok(self.body.to_string())
        }
    }

    fn extractor(body: &'static str, delay: Duration) -> SniffExtractor {
        let cfg = ExtractorConfig {
            sniff_hosts: vec!["play.example.com".into()],
            blocked_hosts: vec!["ads.example.net".into()],
            ..ExtractorConfig::default()
        };
        SniffExtractor::new(&cfg, Arc::new(PageTransport { body, delay }))
    }

    #[tokio::test]
    async fn skips_blocked_hosts() {
        let sniff = extractor(
            r#"<source src="https://ads.example.net/pre.mp4"><source src="https://cdn.example.com/main.m3u8">"#,
            Duration::ZERO,
        );
        assert!(sniff.matches("https", "play.example.com"));
        assert!(!sniff.matches("https", "other.example.com"));
        assert_eq!(
            sniff.fetch("https://play.example.com/v/1").await.unwrap(),
            "https://cdn.example.com/main.m3u8"
        );
    }

    #[tokio::test]
    async fn no_media_is_an_extraction_error() {
        let sniff = extractor("<html>nothing here</html>", Duration::ZERO);
        let err = sniff.fetch("https://play.example.com/v/2").await.unwrap_err();
        assert!(err.to_string().contains("no playable media"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_releases_pending_fetch() {
        let sniff = Arc::new(extractor("<html></html>", Duration::from_millis(300)));
        let pending = {
            let sniff = Arc::clone(&sniff);
            tokio::spawn(async move { sniff.fetch("https://play.example.com/v/3").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        sniff.stop();
        assert_eq!(pending.await.unwrap(), Err(ExtractError::Stopped));
    }
}
