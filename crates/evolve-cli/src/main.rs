//! evolve command-line entry point.
//!
//! # Examples
//!
//! ```bash
//! # Validate a file
//! evolve validate script.py --input "rename photos by date"
//!
//! # Generate, validate, and save
//! evolve generate "print disk usage per folder" --validate -o du.py
//!
//! # Show provider availability
//! evolve providers --format json
//! ```

use anyhow::Result;
use clap::Parser;
use evolve_cli::cli::Cli;
use evolve_cli::{logging, runner, settings};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Held until exit so the file appender flushes
    let guard = logging::init(&cli.log_options())?;

    let config = settings::load(cli.config.as_deref())?;

    let cancel = CancellationToken::new();
    runner::cancel_on_ctrl_c(cancel.clone());

    let exit_code = runner::execute_command(cli.command, &config, cli.format, &cancel).await?;

    drop(guard);
    std::process::exit(exit_code.as_i32());
}
