//! Observable outcome sinks.
//!
//! A `ResultChannel` is where a channel owner publishes outcomes and where UI
//! or CLI code subscribes. Publishing never blocks the caller: the outcome is
//! handed to the `MainThread` and fanned out to subscribers from there.

mod main_thread;
mod outcome;

pub use main_thread::MainThread;
pub use outcome::{FailureKind, Outcome};

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

struct Shared<T> {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Outcome<T>>>>,
    latest: Mutex<Option<Outcome<T>>>,
}

/// Named sink of `Outcome<T>` values delivered on the main thread.
pub struct ResultChannel<T> {
    name: &'static str,
    shared: Arc<Shared<T>>,
    main: MainThread,
}

impl<T> Clone for ResultChannel<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            shared: Arc::clone(&self.shared),
            main: self.main.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ResultChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultChannel")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> ResultChannel<T> {
    pub fn new(name: &'static str, main: MainThread) -> Self {
        Self {
            name,
            shared: Arc::new(Shared {
                subscribers: Mutex::new(Vec::new()),
                latest: Mutex::new(None),
            }),
            main,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Attach a subscriber. It sees every outcome delivered from now on.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        Subscription { rx }
    }

    /// Deliver an outcome unconditionally.
    pub fn post(&self, outcome: Outcome<T>) {
        self.post_if(outcome, || true);
    }

    /// Deliver an outcome if `still_current` holds when the main thread gets to it.
    ///
    /// Owners pass their generation check here so an outcome queued just before
    /// a newer dispatch is dropped instead of reaching subscribers.
    pub fn post_if<F>(&self, outcome: Outcome<T>, still_current: F)
    where
        F: FnOnce() -> bool + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let name = self.name;
        self.main.post(move || {
            if !still_current() {
                tracing::debug!(channel = name, "outcome superseded before delivery");
                return;
            }
            let mut subscribers = shared
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            subscribers.retain(|tx| tx.send(outcome.clone()).is_ok());
            *shared.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        });
    }

    /// Last delivered outcome, if any.
    pub fn latest(&self) -> Option<Outcome<T>> {
        self.shared
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget the last delivered outcome.
    pub fn reset(&self) {
        *self
            .shared
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Receiving end of a channel subscription.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<Outcome<T>>,
}

impl<T> Subscription<T> {
    /// Next outcome; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Outcome<T>> {
        self.rx.recv().await
    }

    /// Next outcome within `wait`, or `None`.
    pub async fn recv_timeout(&mut self, wait: Duration) -> Option<Outcome<T>> {
        tokio::time::timeout(wait, self.rx.recv()).await.ok().flatten()
    }

    /// Outcome already delivered, without waiting.
    pub fn try_recv(&mut self) -> Option<Outcome<T>> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_receives_in_order() {
        let (main, _h) = MainThread::spawn();
        let channel: ResultChannel<u32> = ResultChannel::new("result", main);
        let mut a = channel.subscribe();
        let mut b = channel.subscribe();
        channel.post(Outcome::Success(1));
        channel.post(Outcome::Fallback(0));
        assert_eq!(a.recv().await, Some(Outcome::Success(1)));
        assert_eq!(a.recv().await, Some(Outcome::Fallback(0)));
        assert_eq!(b.recv().await, Some(Outcome::Success(1)));
        assert_eq!(b.recv().await, Some(Outcome::Fallback(0)));
        assert_eq!(channel.latest(), Some(Outcome::Fallback(0)));
    }

    #[tokio::test]
    async fn post_if_drops_stale_outcomes() {
        let (main, _h) = MainThread::spawn();
        let channel: ResultChannel<u32> = ResultChannel::new("player", main);
        let mut sub = channel.subscribe();
        channel.post_if(Outcome::Success(1), || false);
        channel.post_if(Outcome::Success(2), || true);
        assert_eq!(sub.recv().await, Some(Outcome::Success(2)));
        assert_eq!(sub.recv_timeout(Duration::from_millis(30)).await, None);
    }

    #[tokio::test]
    async fn reset_clears_latest_and_dropped_subscribers_are_pruned() {
        let (main, _h) = MainThread::spawn();
        let channel: ResultChannel<u32> = ResultChannel::new("action", main);
        let dropped = channel.subscribe();
        let mut kept = channel.subscribe();
        drop(dropped);
        channel.post(Outcome::Success(5));
        assert_eq!(kept.recv().await, Some(Outcome::Success(5)));
        assert_eq!(channel.subscriber_count(), 1);
        channel.reset();
        assert!(channel.latest().is_none());
    }
}
