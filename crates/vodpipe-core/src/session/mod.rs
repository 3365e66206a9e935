//! Channel owners exposed to the host: VOD browsing and live TV.
//!
//! Shared services are built once into a `Services` bundle and handed to
//! each session explicitly.

mod live;
mod vod;

pub use live::LiveSession;
pub use vod::{VodSession, PUSH_AGENT};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::channel::MainThread;
use crate::config::{TimeoutConfig, VodpipeConfig};
use crate::episode::EpisodeBatchResolver;
use crate::model::SiteCatalog;
use crate::net::{CurlTransport, HttpTransport};
use crate::pool::Pools;
use crate::restart::RestartSignal;
use crate::source::extractors::{EngineExtractor, EngineProfile, StreamEngine};
use crate::source::SourceResolver;
use crate::spider::{NoSpiders, SpiderLoader};

/// Everything the sessions share.
pub struct Services {
    pub timeouts: TimeoutConfig,
    pub catalog: SiteCatalog,
    pub pools: Pools,
    pub main: MainThread,
    pub resolver: Arc<SourceResolver>,
    pub episodes: Arc<EpisodeBatchResolver>,
    pub transport: Arc<dyn HttpTransport>,
    pub spiders: Arc<dyn SpiderLoader>,
    pub restart: RestartSignal,
    engine_profile: watch::Sender<Option<EngineProfile>>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("timeouts", &self.timeouts)
            .field("sites", &self.catalog.sites.len())
            .field("pools", &self.pools)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl Services {
    pub fn builder(config: VodpipeConfig) -> ServicesBuilder {
        ServicesBuilder::new(config)
    }

    /// Native engine settings the engine extractor checks on its next fetch.
    pub fn publish_engine_profile(&self, profile: Option<EngineProfile>) {
        self.engine_profile.send_replace(profile);
    }

    /// Close the shared and private pools and tear down extractors in the background.
    pub fn close(&self) {
        self.pools.close();
        self.episodes.close();
        drop(self.resolver.exit_all());
    }
}

/// Assembles `Services` from configuration plus optional host collaborators.
pub struct ServicesBuilder {
    config: VodpipeConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    spiders: Arc<dyn SpiderLoader>,
    engine: Option<Arc<dyn StreamEngine>>,
    restart: RestartSignal,
    resolver: Option<SourceResolver>,
}

impl ServicesBuilder {
    pub fn new(config: VodpipeConfig) -> Self {
        Self {
            config,
            transport: None,
            spiders: Arc::new(NoSpiders),
            engine: None,
            restart: RestartSignal::default(),
            resolver: None,
        }
    }

    /// HTTP transport (default: libcurl with `[extractors].http_timeout_secs`).
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn spiders(mut self, spiders: Arc<dyn SpiderLoader>) -> Self {
        self.spiders = spiders;
        self
    }

    /// Native engine backing `tvbus://` links.
    pub fn engine(mut self, engine: Arc<dyn StreamEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn restart(mut self, restart: RestartSignal) -> Self {
        self.restart = restart;
        self
    }

    /// Replace the built-in extractor chain.
    pub fn resolver(mut self, resolver: SourceResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Build on the current runtime, delivering through `main`.
    pub fn build(self, main: MainThread) -> Arc<Services> {
        let cfg = self.config;
        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(CurlTransport::new(Duration::from_secs(cfg.extractors.http_timeout_secs)))
        });
        let (engine_profile, profile_rx) = watch::channel(None);
        let resolver = self.resolver.unwrap_or_else(|| {
            let engine = self.engine.map(|engine| {
                Arc::new(EngineExtractor::new(engine, profile_rx, self.restart.clone()))
            });
            SourceResolver::with_defaults(&cfg.extractors, Arc::clone(&transport), engine)
        });
        let episodes = EpisodeBatchResolver::with_defaults(&cfg.pools, Arc::clone(&transport));
        tracing::debug!(resolver = ?resolver, "services ready");
        Arc::new(Services {
            timeouts: cfg.timeouts,
            catalog: cfg.catalog,
            pools: Pools::from_config(&cfg.pools),
            main,
            resolver: Arc::new(resolver),
            episodes: Arc::new(episodes),
            transport,
            spiders: self.spiders,
            restart: self.restart,
            engine_profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_shuts_every_pool() {
        let (main, _delivery) = MainThread::spawn();
        let services = Services::builder(VodpipeConfig::default()).build(main);
        assert!(!services.episodes.is_closed());

        services.close();
        assert!(services.pools.general.is_closed());
        assert!(services.pools.search.is_closed());
        assert!(services.episodes.is_closed());
    }
}
