mod cli;
mod command;
mod engine;
mod error;
mod logging;
mod model;
mod options;
mod orchestrator;
mod storage;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_interactive = args.is_interactive();

    if is_interactive {
        if let Err(e) = logging::init_file(&storage::log_file_path()) {
            // Logging is optional in the TUI; keep going without it.
            eprintln!("logging disabled: {e:#}");
        }
    } else {
        logging::init_stderr();
    }

    match cli::run(args).await {
        Ok(()) => {
            // Exit explicitly in headless modes so blocking writer tasks cannot
            // hold the runtime open.
            if !is_interactive {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "exiting with error");
            Err(e)
        }
    }
}
