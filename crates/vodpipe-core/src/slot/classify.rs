//! Map a finished (or abandoned) operation to the outcome subscribers see.

use tokio::task::JoinError;

use crate::channel::{FailureKind, Outcome};
use crate::source::ExtractError;

/// Classify an operation error by its cause.
///
/// An `ExtractError` anywhere in the chain is user-facing; a restart request
/// is fatal. Anything else degrades to the channel's default value.
pub fn classify_error<T: Default>(err: &anyhow::Error) -> Outcome<T> {
    match err.chain().find_map(|cause| cause.downcast_ref::<ExtractError>()) {
        Some(ExtractError::RestartRequired(msg)) => Outcome::Error(FailureKind::FatalRestart, msg.clone()),
        Some(cause) => Outcome::Error(FailureKind::Extraction, cause.to_string()),
        None => {
            tracing::warn!("operation failed: {:#}", err);
            Outcome::Fallback(T::default())
        }
    }
}

/// Classify a task that never produced a result.
pub fn classify_join_error<T: Default>(err: &JoinError) -> Outcome<T> {
    if err.is_cancelled() {
        Outcome::Cancelled
    } else {
        tracing::warn!("operation panicked: {}", err);
        Outcome::Fallback(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn extraction_cause_is_surfaced_through_context() {
        let err = Err::<(), _>(ExtractError::failed("region blocked"))
            .context("player content")
            .unwrap_err();
        assert_eq!(
            classify_error::<String>(&err),
            Outcome::Error(FailureKind::Extraction, "region blocked".into())
        );
    }

    #[test]
    fn restart_is_fatal() {
        let err: anyhow::Error = ExtractError::RestartRequired("engine changed".into()).into();
        assert_eq!(
            classify_error::<String>(&err),
            Outcome::Error(FailureKind::FatalRestart, "engine changed".into())
        );
    }

    #[test]
    fn other_errors_fall_back_to_default() {
        let err = anyhow::anyhow!("connection reset");
        assert_eq!(classify_error::<Vec<u8>>(&err), Outcome::Fallback(Vec::new()));
    }
}
