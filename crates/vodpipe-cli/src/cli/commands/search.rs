//! `vodpipe search` – fan a keyword out to every searchable site, or page one site.

use anyhow::Result;
use std::time::Duration;
use tokio::time::Instant;
use vodpipe_core::channel::Outcome;
use vodpipe_core::session::VodSession;

use super::{await_outcome, print_json, print_outcome};
use crate::cli::Host;

pub async fn run_search(
    host: &Host,
    keyword: &str,
    quick: bool,
    site: Option<&str>,
    page: &str,
    wait: Option<Duration>,
) -> Result<()> {
    let session = VodSession::new(host.services.clone());
    let wait = wait.unwrap_or_else(|| host.cfg.timeouts.search());

    if let Some(site) = site {
        let mut sub = session.subscribe_result();
        session.search_page(site, keyword, quick, page);
        let outcome = await_outcome(&mut sub, wait).await?;
        session.shutdown();
        return print_outcome(outcome);
    }

    let expected = host
        .cfg
        .catalog
        .searchable()
        .filter(|s| !quick || s.is_quick_search())
        .count();
    if expected == 0 {
        println!("No searchable sites configured.");
        return Ok(());
    }

    let mut sub = session.search().subscribe();
    session.search_all(keyword, quick);
    let deadline = Instant::now() + wait;
    let mut hits = 0usize;
    for _ in 0..expected {
        let outcome = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("search interrupted");
                break;
            }
            outcome = tokio::time::timeout_at(deadline, sub.recv()) => outcome,
        };
        match outcome {
            Ok(Some(Outcome::Success(result))) => {
                hits += result.list.len();
                print_json(&result.list)?;
            }
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(_) => {
                tracing::warn!("some sites did not answer in time");
                break;
            }
        }
    }
    session.stop_search();
    session.shutdown();
    eprintln!("{} result(s)", hits);
    Ok(())
}
