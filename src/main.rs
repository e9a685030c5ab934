mod alert;
mod cli;
mod logging;
mod model;
mod orchestrator;
mod prefs;
mod timer;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let _log_guard = logging::init();

    let res = cli::run(args).await;
    if let Err(e) = &res {
        tracing::error!(error = %format!("{e:#}"), "exiting with error");
    }
    res
}
