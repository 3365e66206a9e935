//! Terminal result of one dispatched operation.

/// Why an `Outcome::Error` was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// An extractor failed; the message is meant for the user.
    Extraction,
    /// A native engine needs a different identity; only a process restart recovers.
    FatalRestart,
}

/// Tagged outcome delivered to channel subscribers.
///
/// `TimedOut` and `Fallback` carry the channel's default value so subscribers
/// always get something to render for a live channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    /// Superseded or cancelled. Produced by classification, never delivered.
    Cancelled,
    /// The bounded wait expired before the operation finished.
    TimedOut(T),
    /// The operation failed with an error that carries no user-facing cause.
    Fallback(T),
    Error(FailureKind, String),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// The carried value: the result on success, the default on timeout/fallback.
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success(v) | Outcome::TimedOut(v) | Outcome::Fallback(v) => Some(v),
            Outcome::Cancelled | Outcome::Error(..) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Success(v) | Outcome::TimedOut(v) | Outcome::Fallback(v) => Some(v),
            Outcome::Cancelled | Outcome::Error(..) => None,
        }
    }

    /// Error message for `Error` outcomes.
    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Error(_, msg) => Some(msg),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Success(v) => Outcome::Success(f(v)),
            Outcome::Cancelled => Outcome::Cancelled,
            Outcome::TimedOut(v) => Outcome::TimedOut(f(v)),
            Outcome::Fallback(v) => Outcome::Fallback(f(v)),
            Outcome::Error(kind, msg) => Outcome::Error(kind, msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_is_carried_by_default_bearing_variants() {
        assert_eq!(Outcome::Success(3).value(), Some(&3));
        assert_eq!(Outcome::TimedOut(0).value(), Some(&0));
        assert_eq!(Outcome::Fallback(0).into_value(), Some(0));
        assert_eq!(Outcome::<i32>::Cancelled.value(), None);
        let err: Outcome<i32> = Outcome::Error(FailureKind::Extraction, "nope".into());
        assert_eq!(err.value(), None);
        assert_eq!(err.message(), Some("nope"));
    }

    #[test]
    fn map_keeps_tag() {
        let out = Outcome::TimedOut(2).map(|v| v * 10);
        assert_eq!(out, Outcome::TimedOut(20));
        let err: Outcome<i32> = Outcome::Error(FailureKind::FatalRestart, "restart".into());
        assert_eq!(
            err.map(|v| v + 1),
            Outcome::Error(FailureKind::FatalRestart, "restart".into())
        );
    }
}
