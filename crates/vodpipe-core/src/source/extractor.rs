//! Capability contract for URL extractors.

use async_trait::async_trait;

use super::error::ExtractError;

/// How the resolver should treat a URL an extractor produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    /// Output is final and player-ready.
    Resolving,
    /// Generic video pass-through: output still needs format detection downstream.
    GenericVideo,
}

/// Turns a matched URL into a player-ready URL.
///
/// `fetch` may block on network I/O or an engine handshake; `stop` must
/// release any such wait. `exit` tears down heavier resources and is safe to
/// call on an extractor that was never used.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    fn matches(&self, scheme: &str, host: &str) -> bool;

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Resolving
    }

    async fn fetch(&self, url: &str) -> Result<String, ExtractError>;

    fn stop(&self) {}

    fn exit(&self) {}
}
