//! CLI for the vodpipe content pipeline.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use vodpipe_core::channel::MainThread;
use vodpipe_core::config::{self, VodpipeConfig};
use vodpipe_core::restart::{BootFlags, RestartSignal};
use vodpipe_core::session::Services;

use commands::{run_detail, run_home, run_live, run_play, run_resolve, run_search};

/// Top-level CLI for vodpipe.
#[derive(Debug, Parser)]
#[command(name = "vodpipe")]
#[command(about = "vodpipe: resolve VOD sites and live sources into playable URLs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run one URL through the extractor chain.
    Resolve {
        /// Link to resolve (push://, thunder://, video://, http(s)://...).
        url: String,
        /// Request header as `Name: value` (repeatable).
        #[arg(short = 'H', long = "header", value_name = "K:V")]
        headers: Vec<String>,
    },

    /// Show the home site's categories and featured titles.
    Home {
        /// Use this site instead of the configured home site.
        #[arg(long, value_name = "KEY")]
        site: Option<String>,
    },

    /// Show a title's detail with its sources and episodes.
    Detail {
        /// Site key from the catalog (or `push_agent`).
        site: String,
        /// Title identifier on that site.
        id: String,
    },

    /// Resolve the player URL of one episode.
    Play {
        /// Site key from the catalog (or `push_agent`).
        site: String,
        /// Source (flag) the episode belongs to.
        flag: String,
        /// Episode identifier or URL.
        id: String,
    },

    /// Search every searchable site, or one site page by page.
    Search {
        keyword: String,
        /// Only query sites that allow quick search.
        #[arg(long)]
        quick: bool,
        /// Query only this site.
        #[arg(long, value_name = "KEY")]
        site: Option<String>,
        /// Result page (with --site).
        #[arg(long, default_value = "1", requires = "site")]
        page: String,
        /// Seconds to wait for all sites (default: the search timeout).
        #[arg(long, value_name = "SECS")]
        wait: Option<u64>,
    },

    /// Load a live playlist, optionally resolving one channel.
    Live {
        /// Playlist URL (M3U or `name,url` text).
        url: String,
        /// Channel to resolve.
        #[arg(long)]
        channel: Option<String>,
        /// Line of the channel to play (0-based).
        #[arg(long, default_value = "0", value_name = "N")]
        line: usize,
        /// Also fetch today's guide for the channel.
        #[arg(long)]
        epg: bool,
        /// Play back programme N (0-based) of today's guide instead of the live stream.
        #[arg(long, value_name = "N", requires = "channel")]
        catchup: Option<usize>,
        /// IANA time zone for guide dates.
        #[arg(long, value_name = "ZONE")]
        time_zone: Option<String>,
    },
}

/// Shared runtime state for one command.
pub struct Host {
    pub cfg: VodpipeConfig,
    pub services: Arc<Services>,
    pub restart: RestartSignal,
}

impl Host {
    fn start(cfg: VodpipeConfig) -> Self {
        let (main, _delivery) = MainThread::spawn();
        let restart = RestartSignal::new(BootFlags::default_path().ok());
        let services = Services::builder(cfg.clone())
            .restart(restart.clone())
            .build(main);
        Self {
            cfg,
            services,
            restart,
        }
    }
}

fn take_boot_flags() -> Result<BootFlags> {
    let path = BootFlags::default_path()?;
    let flags = BootFlags::load_from_path(&path)?;
    if flags != BootFlags::default() {
        BootFlags::default().save_to_path(&path)?;
    }
    Ok(flags)
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        if let CliCommand::Home { site: Some(key) } = &cli.command {
            cfg.catalog.home = Some(key.clone());
        }
        tracing::debug!("loaded config: {:?}", cfg);
        match take_boot_flags() {
            Ok(flags) if flags.resume_live => {
                tracing::info!("previous run asked to resume live playback")
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("boot flags unreadable: {:#}", e),
        }
        let host = Host::start(cfg);

        let result = match cli.command {
            CliCommand::Resolve { url, headers } => run_resolve(&host, &url, &headers).await,
            CliCommand::Home { .. } => run_home(&host).await,
            CliCommand::Detail { site, id } => run_detail(&host, &site, &id).await,
            CliCommand::Play { site, flag, id } => run_play(&host, &site, &flag, &id).await,
            CliCommand::Search {
                keyword,
                quick,
                site,
                page,
                wait,
            } => {
                let wait = wait.map(Duration::from_secs);
                run_search(&host, &keyword, quick, site.as_deref(), &page, wait).await
            }
            CliCommand::Live {
                url,
                channel,
                line,
                epg,
                catchup,
                time_zone,
            } => {
                run_live(
                    &host,
                    &url,
                    channel.as_deref(),
                    line,
                    epg,
                    catchup,
                    time_zone.as_deref(),
                )
                .await
            }
        };

        host.services.close();
        if let Some(request) = host.restart.requested() {
            tracing::warn!(reason = %request.reason, "exiting for restart");
        }
        result
    }
}

#[cfg(test)]
mod tests;
