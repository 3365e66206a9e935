//! Single-flight dispatch for one named channel.
//!
//! A `TaskSlot` holds at most one live operation. Dispatching cancels the
//! previous one, bumps the generation and submits the new operation to the
//! shared pool. A watcher task owned by the slot waits on each operation for
//! the channel's timeout and classifies the result; only the current
//! generation's outcome ever reaches the `ResultChannel`.
//!
//! When the bounded wait expires the operation is detached, not cancelled: it
//! keeps running until it finishes or a later dispatch supersedes it. The
//! generation check keeps whatever it produces from being delivered.

pub mod classify;

use anyhow::Result;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channel::{Outcome, ResultChannel, Subscription};
use crate::config::TimeoutConfig;
use crate::pool::{TaskControl, TaskHandle, WorkerPool};

/// Name and bounded-wait timeout of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotConfig {
    pub name: &'static str,
    pub timeout: Duration,
}

impl SlotConfig {
    pub fn new(name: &'static str, timeout: Duration) -> Self {
        Self { name, timeout }
    }

    pub fn result(t: &TimeoutConfig) -> Self {
        Self::new("result", t.vod())
    }

    pub fn player(t: &TimeoutConfig) -> Self {
        Self::new("player", t.vod())
    }

    pub fn action(t: &TimeoutConfig) -> Self {
        Self::new("action", t.vod())
    }

    pub fn live(t: &TimeoutConfig) -> Self {
        Self::new("live", t.live())
    }

    pub fn epg(t: &TimeoutConfig) -> Self {
        Self::new("epg", t.epg())
    }

    pub fn xml(t: &TimeoutConfig) -> Self {
        Self::new("xml", t.xml())
    }

    pub fn url(t: &TimeoutConfig) -> Self {
        Self::new("url", t.url())
    }
}

struct WatchJob<T> {
    generation: u64,
    handle: TaskHandle<T>,
}

#[derive(Default)]
struct SlotState {
    current: Option<TaskControl>,
    closed: bool,
}

/// Single-flight dispatcher bound to one channel.
pub struct TaskSlot<T> {
    config: SlotConfig,
    pool: WorkerPool,
    sink: ResultChannel<T>,
    generation: Arc<AtomicU64>,
    state: Mutex<SlotState>,
    jobs: mpsc::UnboundedSender<WatchJob<T>>,
    watcher: JoinHandle<()>,
}

impl<T> std::fmt::Debug for TaskSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSlot")
            .field("config", &self.config)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<T> TaskSlot<T>
where
    T: Clone + Default + Send + 'static,
{
    /// Create the slot and start its watcher on the current runtime.
    pub fn new(config: SlotConfig, pool: WorkerPool, sink: ResultChannel<T>) -> Self {
        let generation = Arc::new(AtomicU64::new(0));
        let (jobs, rx) = mpsc::unbounded_channel();
        let watcher = tokio::spawn(watch(config, sink.clone(), Arc::clone(&generation), rx));
        Self {
            config,
            pool,
            sink,
            generation,
            state: Mutex::new(SlotState::default()),
            jobs,
            watcher,
        }
    }

    pub fn config(&self) -> SlotConfig {
        self.config
    }

    pub fn sink(&self) -> &ResultChannel<T> {
        &self.sink
    }

    pub fn subscribe(&self) -> Subscription<T> {
        self.sink.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// An operation is in flight and not yet cancelled.
    pub fn is_busy(&self) -> bool {
        self.lock()
            .current
            .as_ref()
            .is_some_and(|control| !control.is_done())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Supersede whatever is in flight and start `operation`.
    pub fn dispatch<F>(&self, operation: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let mut state = self.lock();
        if state.closed {
            tracing::debug!(channel = self.config.name, "dispatch on shut down slot ignored");
            return;
        }
        if let Some(previous) = state.current.take() {
            if !previous.is_done() {
                previous.cancel();
            }
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = self.pool.submit(operation);
        state.current = Some(handle.control());
        tracing::trace!(channel = self.config.name, generation, "dispatched");
        if self.jobs.send(WatchJob { generation, handle }).is_err() {
            tracing::debug!(channel = self.config.name, "watcher gone; operation detached");
        }
    }

    /// Invalidate the current generation and cancel its operation.
    pub fn cancel(&self) {
        let mut state = self.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(current) = state.current.take() {
            current.cancel();
        }
    }

    /// Cancel, stop the watcher and refuse further dispatches.
    pub fn shutdown(&self) {
        self.cancel();
        self.lock().closed = true;
        self.watcher.abort();
    }
}

impl<T> Drop for TaskSlot<T> {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(current) = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .take()
        {
            current.cancel();
        }
        self.watcher.abort();
    }
}

async fn watch<T>(
    config: SlotConfig,
    sink: ResultChannel<T>,
    live: Arc<AtomicU64>,
    mut jobs: mpsc::UnboundedReceiver<WatchJob<T>>,
) where
    T: Clone + Default + Send + 'static,
{
    while let Some(WatchJob { generation, mut handle }) = jobs.recv().await {
        if live.load(Ordering::SeqCst) != generation {
            continue;
        }
        let control = handle.control();
        let outcome = match tokio::time::timeout(config.timeout, handle.join_mut()).await {
            Ok(Ok(Ok(value))) => Outcome::Success(value),
            Ok(Ok(Err(err))) => classify::classify_error(&err),
            Ok(Err(join_err)) => classify::classify_join_error(&join_err),
            Err(_) => {
                tracing::debug!(channel = config.name, generation, "bounded wait expired");
                Outcome::TimedOut(T::default())
            }
        };
        // Dropping the handle after a timeout detaches the operation.
        drop(handle);

        if outcome.is_cancelled() || control.is_cancelled() || live.load(Ordering::SeqCst) != generation {
            tracing::debug!(channel = config.name, generation, "superseded outcome discarded");
            continue;
        }
        let live = Arc::clone(&live);
        sink.post_if(outcome, move || live.load(Ordering::SeqCst) == generation);
    }
}
