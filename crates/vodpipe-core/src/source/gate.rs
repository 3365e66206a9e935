//! One-shot gate bridging engine callbacks to an awaiting `fetch`.
//!
//! The engine side holds a `GateOpener` and calls `succeed` or `fail` once;
//! the fetch side awaits the `GateWaiter`. The gate carries its own
//! cancellation token, separate from task cancellation, so `stop()` can
//! release a waiting fetch deterministically.

use std::sync::{Mutex, PoisonError};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::error::ExtractError;

#[derive(Debug)]
enum Signal {
    Ready(String),
    Failed(String),
}

/// Engine-side half. The first `succeed`/`fail` wins, later calls are ignored.
#[derive(Debug)]
pub struct GateOpener {
    tx: Mutex<Option<oneshot::Sender<Signal>>>,
    cancel: CancellationToken,
}

/// Fetch-side half.
#[derive(Debug)]
pub struct GateWaiter {
    rx: oneshot::Receiver<Signal>,
    cancel: CancellationToken,
}

/// Create a linked opener/waiter pair.
pub fn gate() -> (GateOpener, GateWaiter) {
    let (tx, rx) = oneshot::channel();
    let cancel = CancellationToken::new();
    (
        GateOpener {
            tx: Mutex::new(Some(tx)),
            cancel: cancel.clone(),
        },
        GateWaiter { rx, cancel },
    )
}

impl GateOpener {
    fn fire(&self, signal: Signal) -> bool {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        match tx {
            Some(tx) => tx.send(signal).is_ok(),
            None => false,
        }
    }

    /// Release the waiter with a resolved stream URL.
    pub fn succeed(&self, url: impl Into<String>) -> bool {
        self.fire(Signal::Ready(url.into()))
    }

    /// Release the waiter with an engine error code.
    pub fn fail(&self, code: impl Into<String>) -> bool {
        self.fire(Signal::Failed(code.into()))
    }

    /// Release the waiter with `ExtractError::Stopped`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_open(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
    }
}

impl GateWaiter {
    /// Wait for the engine. An empty resolved URL is returned as-is.
    pub async fn wait(self) -> Result<String, ExtractError> {
        let GateWaiter { rx, cancel } = self;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExtractError::Stopped),
            signal = rx => match signal {
                Ok(Signal::Ready(url)) => Ok(url),
                Ok(Signal::Failed(code)) => Err(ExtractError::EngineCode(code)),
                Err(_) => Err(ExtractError::Stopped),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn succeed_releases_waiter() {
        let (opener, waiter) = gate();
        let task = tokio::spawn(waiter.wait());
        assert!(opener.succeed("http://127.0.0.1:8902/live.m3u8"));
        assert_eq!(
            task.await.unwrap(),
            Ok("http://127.0.0.1:8902/live.m3u8".to_string())
        );
        assert!(!opener.is_open());
    }

    #[tokio::test]
    async fn first_signal_wins() {
        let (opener, waiter) = gate();
        assert!(opener.fail("-3"));
        assert!(!opener.succeed("late"));
        assert_eq!(waiter.wait().await, Err(ExtractError::EngineCode("-3".into())));
    }

    #[tokio::test]
    async fn cancel_releases_without_signal() {
        let (opener, waiter) = gate();
        let task = tokio::spawn(waiter.wait());
        tokio::time::sleep(Duration::from_millis(10)).await;
        opener.cancel();
        assert_eq!(task.await.unwrap(), Err(ExtractError::Stopped));
    }

    #[tokio::test]
    async fn dropped_opener_means_stopped() {
        let (opener, waiter) = gate();
        drop(opener);
        assert_eq!(waiter.wait().await, Err(ExtractError::Stopped));
    }
}
