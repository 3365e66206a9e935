//! `vodpipe play` – player URL of one episode.

use anyhow::Result;
use vodpipe_core::session::VodSession;

use super::{await_outcome, print_outcome};
use crate::cli::Host;

pub async fn run_play(host: &Host, site: &str, flag: &str, id: &str) -> Result<()> {
    let session = VodSession::new(host.services.clone());
    let mut sub = session.player().subscribe();
    session.player_content(site, flag, id);
    let outcome = await_outcome(&mut sub, host.cfg.timeouts.vod()).await?;
    session.shutdown();
    print_outcome(outcome)
}
