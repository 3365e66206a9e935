//! Download-manager links (thunder/flashget/qqdl).

use async_trait::async_trait;

use crate::source::error::ExtractError;
use crate::source::extractor::Extractor;
use crate::source::link;

/// Decodes base64-wrapped download links to the URL they carry.
#[derive(Debug, Default)]
pub struct ThunderExtractor;

#[async_trait]
impl Extractor for ThunderExtractor {
    fn name(&self) -> &'static str {
        "thunder"
    }

    fn matches(&self, scheme: &str, _host: &str) -> bool {
        matches!(scheme, "thunder" | "flashget" | "qqdl")
    }

    async fn fetch(&self, url: &str) -> Result<String, ExtractError> {
        link::decode_wrapped_link(url)
            .ok_or_else(|| ExtractError::failed(format!("cannot decode link: {}", url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    #[tokio::test]
    async fn decodes_or_fails_with_message() {
        let thunder = ThunderExtractor;
        let link = format!("thunder://{}", STANDARD.encode("AAftp://dl.example.com/a.mkvZZ"));
        assert!(thunder.matches("thunder", ""));
        assert_eq!(thunder.fetch(&link).await.unwrap(), "ftp://dl.example.com/a.mkv");
        let err = thunder.fetch("thunder://%%%").await.unwrap_err();
        assert!(matches!(err, ExtractError::Failed(_)));
    }
}
