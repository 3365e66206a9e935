//! `video://` pass-through links.

use async_trait::async_trait;

use super::strip_scheme;
use crate::source::error::ExtractError;
use crate::source::extractor::{Extractor, ExtractorKind};

/// Generic video pass-through. The URL is handed on unchanged apart from the
/// wrapper scheme; the player still sniffs its format.
#[derive(Debug, Default)]
pub struct VideoExtractor;

#[async_trait]
impl Extractor for VideoExtractor {
    fn name(&self) -> &'static str {
        "video"
    }

    fn matches(&self, scheme: &str, _host: &str) -> bool {
        scheme == "video"
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::GenericVideo
    }

    async fn fetch(&self, url: &str) -> Result<String, ExtractError> {
        Ok(strip_scheme(url, "video").unwrap_or(url).trim().to_string())
    }
}
