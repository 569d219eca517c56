//! Command execution and runtime logic.
//!
//! Routes parsed commands to their handlers and wires Ctrl-C to the
//! cancellation token every long operation observes.

use anyhow::Result;
use evolve_core::EvolveConfig;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::Commands;
use crate::commands::{self, validate::ValidateArgs};
use crate::{ExitCode, OutputFormat};

/// Cancels `token` on the first Ctrl-C.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            token.cancel();
        }
    });
}

/// Executes the specified CLI command.
pub async fn execute_command(
    command: Commands,
    config: &EvolveConfig,
    output_format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<ExitCode> {
    match command {
        Commands::Validate {
            file,
            input,
            language,
            no_sandbox,
            timeout,
            memory_mb,
            allow_network,
        } => {
            let args = ValidateArgs {
                file,
                input,
                language,
                no_sandbox,
                timeout,
                memory_mb,
                allow_network,
            };
            commands::validate::run(&args, config, output_format, cancel).await
        }
        Commands::Generate {
            description,
            validate,
            output,
        } => {
            commands::generate::run(&description, validate, output, config, output_format, cancel)
                .await
        }
        Commands::Providers => commands::providers::run(config, output_format).await,
        Commands::Completions { shell } => Ok(commands::completions::run(shell)),
    }
}
