//! `vodpipe home` – categories and featured titles of the home site.

use anyhow::Result;
use vodpipe_core::session::VodSession;

use super::{await_outcome, print_outcome};
use crate::cli::Host;

pub async fn run_home(host: &Host) -> Result<()> {
    let session = VodSession::new(host.services.clone());
    let mut sub = session.subscribe_result();
    session.home_content();
    let outcome = await_outcome(&mut sub, host.cfg.timeouts.vod()).await?;
    session.shutdown();
    print_outcome(outcome)
}
