//! CLI command handlers, one per file, plus the shared outcome printing.

mod detail;
mod home;
mod live;
mod play;
mod resolve;
mod search;

pub use detail::run_detail;
pub use home::run_home;
pub use live::run_live;
pub use play::run_play;
pub use resolve::run_resolve;
pub use search::run_search;

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use vodpipe_core::channel::{FailureKind, Outcome, Subscription};
use vodpipe_core::source::ExtractError;

/// Extra time allowed past a channel's own timeout for delivery.
const DELIVERY_SLACK: Duration = Duration::from_secs(2);

/// Wait for the next outcome of a channel whose operations time out after `timeout`.
async fn await_outcome<T>(sub: &mut Subscription<T>, timeout: Duration) -> Result<Outcome<T>> {
    sub.recv_timeout(timeout + DELIVERY_SLACK)
        .await
        .context("no outcome delivered")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the carried value, or turn an error outcome back into an error.
fn print_outcome<T: Serialize>(outcome: Outcome<T>) -> Result<()> {
    match outcome {
        Outcome::Success(value) => print_json(&value),
        Outcome::TimedOut(value) => {
            eprintln!("timed out; showing empty result");
            print_json(&value)
        }
        Outcome::Fallback(value) => {
            eprintln!("operation failed (see log); showing empty result");
            print_json(&value)
        }
        Outcome::Cancelled => anyhow::bail!("operation cancelled"),
        Outcome::Error(FailureKind::Extraction, msg) => Err(ExtractError::Failed(msg).into()),
        Outcome::Error(FailureKind::FatalRestart, msg) => {
            Err(ExtractError::RestartRequired(msg).into())
        }
    }
}
