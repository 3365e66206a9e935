//! Concurrent multi-site search.
//!
//! One task per provider on the wide search pool; each delivers its own
//! partial result to the shared channel as soon as it completes. There is no
//! merge step and no timeout at this layer; a provider that never answers
//! simply never delivers.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::channel::{Outcome, ResultChannel};
use crate::pool::{TaskControl, WorkerPool};

/// What to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: String,
    /// Quick search: providers may return a shorter, cheaper listing.
    pub quick: bool,
    pub page: String,
}

impl SearchQuery {
    pub fn new(keyword: impl Into<String>, quick: bool) -> Self {
        Self {
            keyword: keyword.into(),
            quick,
            page: "1".to_string(),
        }
    }

    pub fn page(mut self, page: impl Into<String>) -> Self {
        self.page = page.into();
        self
    }
}

/// One searchable content source.
#[async_trait]
pub trait SearchProvider<T>: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &SearchQuery) -> anyhow::Result<T>;
}

/// Fan-out dispatcher with bulk cancellation.
pub struct SearchFanout<T> {
    pool: WorkerPool,
    sink: ResultChannel<T>,
    epoch: Arc<AtomicU64>,
    tracked: Mutex<Vec<TaskControl>>,
}

impl<T> SearchFanout<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(pool: WorkerPool, sink: ResultChannel<T>) -> Self {
        Self {
            pool,
            sink,
            epoch: Arc::new(AtomicU64::new(0)),
            tracked: Mutex::new(Vec::new()),
        }
    }

    pub fn sink(&self) -> &ResultChannel<T> {
        &self.sink
    }

    /// Provider tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| !c.is_done())
            .count()
    }

    /// Start one search task per provider.
    pub fn search_all(&self, providers: &[Arc<dyn SearchProvider<T>>], query: &SearchQuery) {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let mut tracked = self.tracked.lock().unwrap_or_else(PoisonError::into_inner);
        tracked.retain(|c| !c.is_done());
        tracing::debug!(keyword = %query.keyword, providers = providers.len(), "search fan-out");

        for provider in providers {
            let provider = Arc::clone(provider);
            let query = query.clone();
            let sink = self.sink.clone();
            let live = Arc::clone(&self.epoch);
            let handle = self.pool.submit(async move {
                match provider.search(&query).await {
                    Ok(result) => {
                        sink.post_if(Outcome::Success(result), move || live.load(Ordering::SeqCst) == epoch);
                    }
                    Err(e) => {
                        tracing::warn!(provider = provider.name(), "search failed: {:#}", e);
                    }
                }
                Ok(())
            });
            tracked.push(handle.control());
        }
    }

    /// Cancel every provider task; nothing already dispatched is delivered afterwards.
    pub fn stop_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let tracked: Vec<TaskControl> = self
            .tracked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for control in tracked {
            control.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MainThread;
    use std::time::Duration;

    struct Delayed {
        name: &'static str,
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl SearchProvider<String> for Delayed {
        fn name(&self) -> &str {
            self.name
        }

        async fn search(&self, query: &SearchQuery) -> anyhow::Result<String> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                anyhow::bail!("{} is down", self.name);
            }
            Ok(format!("{}:{}", self.name, query.keyword))
        }
    }

    fn provider(name: &'static str, ms: u64, fail: bool) -> Arc<dyn SearchProvider<String>> {
        Arc::new(Delayed {
            name,
            delay: Duration::from_millis(ms),
            fail,
        })
    }

    fn fanout() -> SearchFanout<String> {
        let (main, _h) = MainThread::spawn();
        SearchFanout::new(WorkerPool::new("search", 8), ResultChannel::new("search", main))
    }

    #[tokio::test]
    async fn results_arrive_first_completed_first_and_failures_are_isolated() {
        let fanout = fanout();
        let mut sub = fanout.sink().subscribe();
        let providers = vec![
            provider("slow", 80, false),
            provider("broken", 10, true),
            provider("fast", 20, false),
        ];
        fanout.search_all(&providers, &SearchQuery::new("moon", false));

        assert_eq!(sub.recv().await, Some(Outcome::Success("fast:moon".into())));
        assert_eq!(sub.recv().await, Some(Outcome::Success("slow:moon".into())));
        assert_eq!(sub.recv_timeout(Duration::from_millis(100)).await, None);
    }

    #[tokio::test]
    async fn stop_all_silences_pending_providers() {
        let fanout = fanout();
        let mut sub = fanout.sink().subscribe();
        let providers = vec![provider("a", 10, false), provider("b", 150, false), provider("c", 200, false)];
        fanout.search_all(&providers, &SearchQuery::new("sun", true));

        assert_eq!(sub.recv().await, Some(Outcome::Success("a:sun".into())));
        fanout.stop_all();
        assert_eq!(fanout.in_flight(), 0);
        assert_eq!(sub.recv_timeout(Duration::from_millis(300)).await, None);
    }

    #[tokio::test]
    async fn search_after_stop_delivers_again() {
        let fanout = fanout();
        let mut sub = fanout.sink().subscribe();
        fanout.search_all(&[provider("a", 100, false)], &SearchQuery::new("old", false));
        fanout.stop_all();
        fanout.search_all(&[provider("a", 10, false)], &SearchQuery::new("new", false));
        assert_eq!(sub.recv().await, Some(Outcome::Success("a:new".into())));
        assert_eq!(sub.recv_timeout(Duration::from_millis(200)).await, None);
    }
}
