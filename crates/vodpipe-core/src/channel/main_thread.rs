//! Single logical consumer thread for outcome delivery.
//!
//! Posted closures run one at a time, in posting order, on one tokio task.
//! Every `ResultChannel` sharing a `MainThread` delivers through it, so
//! subscribers never observe two deliveries concurrently.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle used to post work to the delivery task. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MainThread {
    tx: mpsc::UnboundedSender<Job>,
}

impl MainThread {
    /// Spawn the delivery task on the current runtime.
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
            tracing::debug!("main thread delivery loop ended");
        });
        (Self { tx }, handle)
    }

    /// Queue a closure. Dropped silently once the delivery task is gone.
    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            tracing::debug!("main thread gone; delivery dropped");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn jobs_run_in_posting_order() {
        let (main, _handle) = MainThread::spawn();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let seen = Arc::clone(&seen);
            main.post(move || seen.lock().unwrap().push(i));
        }
        let (tx, rx) = tokio::sync::oneshot::channel();
        main.post(move || {
            let _ = tx.send(());
        });
        rx.await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }
}
