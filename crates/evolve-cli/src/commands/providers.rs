//! Providers command implementation.
//!
//! Probes every configured provider and shows the resulting fallback order.

use anyhow::Result;
use evolve_core::EvolveConfig;
use tracing::info;

use super::common::build_router;
use crate::formatters::{providers_text, render};
use crate::{ExitCode, OutputFormat};

/// Runs the providers command.
///
/// Returns [`ExitCode::ERROR`] when no provider is available.
pub async fn run(config: &EvolveConfig, output_format: OutputFormat) -> Result<ExitCode> {
    let router = build_router(config)?;
    let order = router.refresh_availability().await;
    info!(available = order.len(), "Provider availability refreshed");

    let stats = router.provider_stats();
    println!("{}", render(&stats, output_format, providers_text)?);

    Ok(if order.is_empty() {
        ExitCode::ERROR
    } else {
        ExitCode::SUCCESS
    })
}
