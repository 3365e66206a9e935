use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::model::SiteCatalog;

/// Per-channel bounded-wait timeouts, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Home, category, detail, player and action content.
    pub vod: u64,
    /// Live playlist loading.
    pub live: u64,
    /// EPG JSON fetch for a single channel.
    pub epg: u64,
    /// XMLTV parsing for a whole live source.
    pub xml: u64,
    /// Live URL resolution (extractor fetch).
    pub url: u64,
    /// How long a multi-site search waits for every site.
    pub search: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            vod: 30_000,
            live: 30_000,
            epg: 5_000,
            xml: 60_000,
            url: 10_000,
            search: 30_000,
        }
    }
}

impl TimeoutConfig {
    pub fn vod(&self) -> Duration {
        Duration::from_millis(self.vod)
    }

    pub fn live(&self) -> Duration {
        Duration::from_millis(self.live)
    }

    pub fn epg(&self) -> Duration {
        Duration::from_millis(self.epg)
    }

    pub fn xml(&self) -> Duration {
        Duration::from_millis(self.xml)
    }

    pub fn url(&self) -> Duration {
        Duration::from_millis(self.url)
    }

    pub fn search(&self) -> Duration {
        Duration::from_millis(self.search)
    }
}

/// Worker pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Workers in the general pool shared by every channel.
    pub general_workers: usize,
    /// The search pool is `general_workers * search_factor` wide.
    pub search_factor: usize,
    /// Workers used for episode pre-extraction.
    pub episode_workers: usize,
    /// Deadline for one episode pre-extraction batch, in seconds.
    pub episode_deadline_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            general_workers: 5,
            search_factor: 4,
            episode_workers: 8,
            episode_deadline_secs: 30,
        }
    }
}

impl PoolConfig {
    pub fn search_workers(&self) -> usize {
        self.general_workers.max(1) * self.search_factor.max(1)
    }

    pub fn episode_deadline(&self) -> Duration {
        Duration::from_secs(self.episode_deadline_secs)
    }
}

/// Snapshot of the host/blocklist settings handed to extractors at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Hosts whose pages are fetched and sniffed for a media URL.
    pub sniff_hosts: Vec<String>,
    /// Ad hosts: media URLs on these hosts are never returned by the sniffer.
    pub blocked_hosts: Vec<String>,
    /// Total timeout for one HTTP request made by an extractor, in seconds.
    pub http_timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            sniff_hosts: Vec::new(),
            blocked_hosts: Vec::new(),
            http_timeout_secs: 15,
        }
    }
}

/// Global configuration loaded from `~/.config/vodpipe/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VodpipeConfig {
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub pools: PoolConfig,
    #[serde(default)]
    pub extractors: ExtractorConfig,
    /// Content sites; empty by default.
    #[serde(default)]
    pub catalog: SiteCatalog,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vodpipe")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<VodpipeConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = VodpipeConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: VodpipeConfig = toml::from_str(&data)?;
    Ok(cfg)
}
