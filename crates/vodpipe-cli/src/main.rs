use vodpipe_core::logging;
use vodpipe_core::source::ExtractError;

mod cli;

use crate::cli::CliCommand;

/// Exit status asking the supervisor to start the process again.
const EXIT_RESTART: i32 = 75;

#[tokio::main]
async fn main() {
    // Initialize logging as early as possible.
    if let Err(err) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("log file unavailable, logging to stderr: {:#}", err);
    }

    if let Err(err) = CliCommand::run_from_args().await {
        let restart = err
            .chain()
            .find_map(|c| c.downcast_ref::<ExtractError>())
            .is_some_and(ExtractError::is_restart_required);
        eprintln!("vodpipe error: {:#}", err);
        std::process::exit(if restart { EXIT_RESTART } else { 1 });
    }
}
