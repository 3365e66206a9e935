//! `push://` links shared from another device.

use async_trait::async_trait;

use super::strip_scheme;
use crate::source::error::ExtractError;
use crate::source::extractor::Extractor;

/// Unwraps `push://<url>` to the URL it carries.
#[derive(Debug, Default)]
pub struct PushExtractor;

#[async_trait]
impl Extractor for PushExtractor {
    fn name(&self) -> &'static str {
        "push"
    }

    fn matches(&self, scheme: &str, _host: &str) -> bool {
        scheme == "push"
    }

    async fn fetch(&self, url: &str) -> Result<String, ExtractError> {
        strip_scheme(url, "push")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ExtractError::failed("empty push link"))
    }
}
