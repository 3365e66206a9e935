//! `vodpipe detail` – one title with its sources and episodes.

use anyhow::Result;
use vodpipe_core::session::VodSession;

use super::{await_outcome, print_outcome};
use crate::cli::Host;

pub async fn run_detail(host: &Host, site: &str, id: &str) -> Result<()> {
    let session = VodSession::new(host.services.clone());
    let mut sub = session.subscribe_result();
    session.detail_content(site, id);
    let outcome = await_outcome(&mut sub, host.cfg.timeouts.vod()).await?;
    session.shutdown();
    print_outcome(outcome)
}
