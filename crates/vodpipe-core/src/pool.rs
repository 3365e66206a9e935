//! Bounded worker pools yielding cancellable task handles.
//!
//! A pool is a named semaphore over `tokio::spawn`: every submitted future
//! waits for a permit before it runs, so at most `workers` operations of a
//! tier make progress at once. Two tiers exist: a small general pool shared by
//! every channel and a wider pool for search fan-out.

use anyhow::Result;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinError, JoinHandle};

use crate::config::PoolConfig;

/// Marks the handle finished when the spawned task ends, is aborted or panics.
struct FinishGuard(Arc<AtomicBool>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Cancellable side of a submitted operation. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TaskControl {
    abort: AbortHandle,
    cancelled: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl TaskControl {
    /// Request cancellation. Cooperative: the operation stops at its next await point.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.abort.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// True once the spawned task has stopped running (any reason).
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Finished or cancelled: no longer worth cancelling.
    pub fn is_done(&self) -> bool {
        self.is_finished() || self.is_cancelled()
    }
}

/// Awaitable side of a submitted operation.
#[derive(Debug)]
pub struct TaskHandle<T> {
    join: JoinHandle<Result<T>>,
    control: TaskControl,
}

impl<T> TaskHandle<T> {
    pub fn control(&self) -> TaskControl {
        self.control.clone()
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// Wait for the operation. Dropping the handle detaches the task, it keeps running.
    pub async fn join(self) -> std::result::Result<Result<T>, JoinError> {
        self.join.await
    }

    /// Borrow the join handle so a bounded wait can give up without consuming it.
    pub fn join_mut(&mut self) -> &mut JoinHandle<Result<T>> {
        &mut self.join
    }
}

/// A named, bounded worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: &'static str,
    workers: usize,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(name: &'static str, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            name,
            workers,
            permits: Arc::new(Semaphore::new(workers)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Operations currently holding a worker.
    pub fn busy(&self) -> usize {
        self.workers.saturating_sub(self.permits.available_permits())
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Submit an operation. It starts as soon as a worker is free.
    pub fn submit<T, F>(&self, operation: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let pool = self.name;
        let cancelled = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let guard = FinishGuard(Arc::clone(&finished));
        let join = tokio::spawn(async move {
            let _guard = guard;
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| anyhow::anyhow!("worker pool '{}' is shut down", pool))?;
            operation.await
        });
        let control = TaskControl {
            abort: join.abort_handle(),
            cancelled,
            finished,
        };
        TaskHandle { join, control }
    }

    /// Refuse new work: queued operations fail, running ones are not drained.
    pub fn close(&self) {
        tracing::debug!(pool = self.name, "closing worker pool");
        self.permits.close();
    }
}

/// The two pool tiers shared by all channel owners.
#[derive(Debug, Clone)]
pub struct Pools {
    pub general: WorkerPool,
    pub search: WorkerPool,
}

impl Pools {
    pub fn from_config(cfg: &PoolConfig) -> Self {
        Self {
            general: WorkerPool::new("general", cfg.general_workers),
            search: WorkerPool::new("search", cfg.search_workers()),
        }
    }

    pub fn close(&self) {
        self.general.close();
        self.search.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn submit_returns_value() {
        let pool = WorkerPool::new("test", 2);
        let handle = pool.submit(async { Ok(7u32) });
        let value = handle.join().await.unwrap().unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn cancel_aborts_and_marks_done() {
        let pool = WorkerPool::new("test", 1);
        let handle = pool.submit(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        });
        let control = handle.control();
        assert!(!control.is_done());
        control.cancel();
        let err = handle.join().await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(control.is_cancelled());
        assert!(control.is_finished());
    }

    #[tokio::test]
    async fn pool_bounds_concurrency() {
        let pool = WorkerPool::new("test", 1);
        let first = pool.submit(async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(1)
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.busy(), 1);
        let second = pool.submit(async { Ok(2) });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!second.control().is_finished());
        assert_eq!(first.join().await.unwrap().unwrap(), 1);
        assert_eq!(second.join().await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn closed_pool_rejects_queued_work() {
        let pool = WorkerPool::new("test", 1);
        pool.close();
        let handle = pool.submit(async { Ok(()) });
        let res = handle.join().await.unwrap();
        assert!(res.is_err());
        assert!(pool.is_closed());
    }

    #[test]
    fn search_tier_is_wider() {
        let cfg = PoolConfig::default();
        let pools = Pools::from_config(&cfg);
        assert_eq!(pools.general.workers(), 5);
        assert_eq!(pools.search.workers(), 20);
    }
}
