//! `vodpipe live` – load a playlist and optionally play one channel, live or a past programme.

use anyhow::{Context, Result};
use std::sync::Arc;
use vodpipe_core::model::Live;
use vodpipe_core::session::LiveSession;
use vodpipe_core::spider::{NoEpgXml, PlaylistLiveLoader};

use super::{await_outcome, print_json, print_outcome};
use crate::cli::Host;

pub async fn run_live(
    host: &Host,
    url: &str,
    channel: Option<&str>,
    line: usize,
    epg: bool,
    catchup: Option<usize>,
    time_zone: Option<&str>,
) -> Result<()> {
    let services = &host.services;
    let loader = Arc::new(PlaylistLiveLoader::new(Arc::clone(&services.transport)));
    let session = LiveSession::new(Arc::clone(services), loader, Arc::new(NoEpgXml));
    let timeouts = &host.cfg.timeouts;

    let mut live_sub = session.live().subscribe();
    session.get_live(Live {
        name: url.to_string(),
        url: url.to_string(),
        time_zone: time_zone.unwrap_or_default().to_string(),
        ..Live::default()
    });
    let loaded = await_outcome(&mut live_sub, timeouts.live())
        .await?
        .into_value()
        .context("live source failed to load")?;

    let Some(name) = channel else {
        let summary: Vec<(String, usize)> = loaded
            .groups
            .iter()
            .map(|g| (g.name.clone(), g.channels.len()))
            .collect();
        session.shutdown();
        return print_json(&summary);
    };

    let mut selected = loaded
        .groups
        .iter()
        .flat_map(|g| g.channels.iter())
        .find(|c| c.name == name)
        .cloned()
        .with_context(|| format!("no channel named '{}'", name))?;
    if line >= selected.urls.len() {
        anyhow::bail!("channel '{}' has {} line(s)", name, selected.urls.len());
    }
    selected.line = line;

    let mut guide = None;
    if epg || catchup.is_some() {
        let mut epg_sub = session.epg().subscribe();
        session.get_epg(selected.clone());
        let outcome = await_outcome(&mut epg_sub, timeouts.epg()).await?;
        guide = outcome.value().cloned();
        if epg {
            print_outcome(outcome)?;
        }
    }

    let mut url_sub = session.url().subscribe();
    match catchup {
        Some(index) => {
            let programme = guide
                .as_ref()
                .and_then(|g| g.list.get(index))
                .with_context(|| format!("no programme {} in today's guide for '{}'", index, name))?;
            tracing::info!(channel = name, programme = %programme.title, "playing back programme");
            session.get_catchup_url(selected, programme);
        }
        None => session.get_url(selected),
    }
    let outcome = await_outcome(&mut url_sub, timeouts.url()).await?;
    session.shutdown();
    print_outcome(outcome)
}
