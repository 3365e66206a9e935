//! Typed extraction failures.

use thiserror::Error;

/// Error raised by an extractor. Its message is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("{0}")]
    Failed(String),
    /// The native engine reported a negative error code.
    #[error("stream engine failed with code {0}")]
    EngineCode(String),
    /// The engine's identity changed under it; recovery needs a process restart.
    #[error("{0}")]
    RestartRequired(String),
    #[error("extraction stopped")]
    Stopped,
    /// A fetch is already waiting on this extractor.
    #[error("extractor is busy with another fetch")]
    Busy,
}

impl ExtractError {
    pub fn failed(msg: impl Into<String>) -> Self {
        ExtractError::Failed(msg.into())
    }

    pub fn is_restart_required(&self) -> bool {
        matches!(self, ExtractError::RestartRequired(_))
    }
}
