//! Deadline-bounded pre-resolution of episode lists.
//!
//! Episodes whose URLs need an extra extraction step (wrapped download links,
//! playlist links) are pulled out of their flag and expanded concurrently on
//! a private pool. Each expansion may yield several episodes. Results are
//! appended to the flag after the episodes that were left in place, in
//! submission order. A failed expansion is dropped and its original entry is
//! not restored; expansions still running at the batch deadline are aborted.

mod expanders;

pub use expanders::{PlaylistExpander, ThunderLinkExpander};

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::PoolConfig;
use crate::model::{Episode, Flag};
use crate::net::HttpTransport;
use crate::pool::{TaskHandle, WorkerPool};

/// Expands one episode whose URL needs extraction.
#[async_trait]
pub trait EpisodeExpander: Send + Sync {
    fn name(&self) -> &'static str;

    fn matches(&self, url: &str) -> bool;

    async fn expand(&self, episode: &Episode) -> Result<Vec<Episode>>;
}

pub struct EpisodeBatchResolver {
    expanders: Vec<Arc<dyn EpisodeExpander>>,
    pool: WorkerPool,
    deadline: Duration,
}

impl std::fmt::Debug for EpisodeBatchResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.expanders.iter().map(|e| e.name()).collect();
        f.debug_struct("EpisodeBatchResolver")
            .field("expanders", &names)
            .field("workers", &self.pool.workers())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl EpisodeBatchResolver {
    pub fn new(expanders: Vec<Arc<dyn EpisodeExpander>>, pool: WorkerPool, deadline: Duration) -> Self {
        Self {
            expanders,
            pool,
            deadline,
        }
    }

    /// Thunder and playlist expanders on a pool sized from `[pools]`.
    pub fn with_defaults(cfg: &PoolConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self::new(
            vec![
                Arc::new(ThunderLinkExpander),
                Arc::new(PlaylistExpander::new(transport)),
            ],
            WorkerPool::new("episode", cfg.episode_workers),
            cfg.episode_deadline(),
        )
    }

    /// Close the private pool. Later batches leave eligible episodes out.
    pub fn close(&self) {
        self.pool.close();
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    fn expander_for(&self, url: &str) -> Option<&Arc<dyn EpisodeExpander>> {
        self.expanders.iter().find(|e| e.matches(url))
    }

    pub fn needs_extraction(&self, url: &str) -> bool {
        self.expander_for(url).is_some()
    }

    /// Expand eligible episodes of every flag in place. Never fails as a whole.
    pub async fn resolve(&self, flags: &mut [Flag]) {
        let mut pending: Vec<(usize, String, TaskHandle<Vec<Episode>>)> = Vec::new();
        for (index, flag) in flags.iter_mut().enumerate() {
            let mut kept = Vec::with_capacity(flag.episodes.len());
            for episode in flag.episodes.drain(..) {
                match self.expander_for(&episode.url) {
                    Some(expander) => {
                        let expander = Arc::clone(expander);
                        let name = episode.name.clone();
                        let handle = self.pool.submit(async move { expander.expand(&episode).await });
                        pending.push((index, name, handle));
                    }
                    None => kept.push(episode),
                }
            }
            flag.episodes = kept;
        }
        if pending.is_empty() {
            return;
        }

        tracing::debug!(tasks = pending.len(), "expanding episodes");
        let deadline = tokio::time::Instant::now() + self.deadline;
        let mut abandoned = 0usize;
        for (index, name, handle) in pending {
            let control = handle.control();
            match tokio::time::timeout_at(deadline, handle.join()).await {
                Ok(Ok(Ok(episodes))) => flags[index].episodes.extend(episodes),
                Ok(Ok(Err(e))) => tracing::warn!(episode = %name, "episode expansion failed: {:#}", e),
                Ok(Err(e)) => tracing::warn!(episode = %name, "episode expansion task failed: {}", e),
                Err(_) => {
                    control.cancel();
                    abandoned += 1;
                }
            }
        }
        if abandoned > 0 {
            tracing::info!(abandoned, "episode expansion deadline reached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Expands `cloud://N` into `https://cdn.example.com/N.mp4`; fails on `cloud://2`.
    struct CloudExpander {
        delay: Duration,
    }

    #[async_trait]
    impl EpisodeExpander for CloudExpander {
        fn name(&self) -> &'static str {
            "cloud"
        }

        fn matches(&self, url: &str) -> bool {
            url.starts_with("cloud://")
        }

        async fn expand(&self, episode: &Episode) -> Result<Vec<Episode>> {
            let id = episode.url.trim_start_matches("cloud://");
            if id == "slow" {
                tokio::time::sleep(self.delay).await;
            }
            if id == "2" {
                anyhow::bail!("share link expired");
            }
            Ok(vec![Episode::new(
                format!("{}-resolved", episode.name),
                format!("https://cdn.example.com/{}.mp4", id),
            )])
        }
    }

    fn resolver(deadline: Duration) -> EpisodeBatchResolver {
        EpisodeBatchResolver::new(
            vec![Arc::new(CloudExpander {
                delay: Duration::from_secs(5),
            })],
            WorkerPool::new("episode", 4),
            deadline,
        )
    }

    #[tokio::test]
    async fn failed_item_is_dropped_without_failing_batch() {
        let mut flags = vec![Flag {
            flag: "cloud".into(),
            episodes: vec![
                Episode::new("E1", "cloud://1"),
                Episode::new("E2", "cloud://2"),
                Episode::new("Direct", "https://cdn.example.com/direct.mp4"),
                Episode::new("E3", "cloud://3"),
            ],
        }];
        resolver(Duration::from_secs(5)).resolve(&mut flags).await;
        let names: Vec<&str> = flags[0].episodes.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Direct", "E1-resolved", "E3-resolved"]);
        assert_eq!(flags[0].episodes[2].url, "https://cdn.example.com/3.mp4");
    }

    #[tokio::test]
    async fn deadline_abandons_slow_items() {
        let mut flags = vec![
            Flag {
                flag: "a".into(),
                episodes: vec![Episode::new("Slow", "cloud://slow"), Episode::new("E1", "cloud://1")],
            },
            Flag {
                flag: "b".into(),
                episodes: vec![Episode::new("Plain", "https://cdn.example.com/p.mp4")],
            },
        ];
        let started = std::time::Instant::now();
        resolver(Duration::from_millis(100)).resolve(&mut flags).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(flags[0].episodes, vec![Episode::new("E1-resolved", "https://cdn.example.com/1.mp4")]);
        assert_eq!(flags[1].episodes.len(), 1);
    }

    #[tokio::test]
    async fn closed_resolver_keeps_direct_episodes() {
        let resolver = resolver(Duration::from_secs(1));
        resolver.close();
        assert!(resolver.is_closed());

        let mut flags = vec![Flag {
            flag: "cloud".into(),
            episodes: vec![
                Episode::new("E1", "cloud://1"),
                Episode::new("Direct", "https://cdn.example.com/direct.mp4"),
            ],
        }];
        resolver.resolve(&mut flags).await;
        assert_eq!(flags[0].episodes, vec![Episode::new("Direct", "https://cdn.example.com/direct.mp4")]);
    }

    #[tokio::test]
    async fn nothing_eligible_is_untouched() {
        let original = vec![Flag::single("push", "https://cdn.example.com/a.m3u8")];
        let mut flags = original.clone();
        let resolver = resolver(Duration::from_secs(1));
        assert!(!resolver.needs_extraction("https://cdn.example.com/a.m3u8"));
        resolver.resolve(&mut flags).await;
        assert_eq!(flags, original);
    }
}
