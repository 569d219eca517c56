//! Output formatters for CLI commands.
//!
//! JSON output is the serialized report; text output is a colored summary
//! meant for terminals.

use anyhow::Result;
use colored::Colorize;
use evolve_core::stats::{ProviderStats, RouterStats};
use evolve_core::{LayerState, SandboxExecutionResult, ValidationResult};
use serde::Serialize;
use std::fmt::Write as _;

use crate::OutputFormat;

/// Maximum characters of sandbox output echoed in text mode.
const OUTPUT_PREVIEW_CHARS: usize = 2_000;

/// Renders `data` as JSON, or with `text` in text mode.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Examples
///
/// ```
/// use evolve_cli::OutputFormat;
/// use evolve_cli::formatters::render;
///
/// let json = render(&vec!["gemini", "local"], OutputFormat::Json, |v| v.join(" -> "))?;
/// assert!(json.contains("\"gemini\""));
///
/// let text = render(&vec!["gemini", "local"], OutputFormat::Text, |v| v.join(" -> "))?;
/// assert_eq!(text, "gemini -> local");
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn render<T: Serialize>(
    data: &T,
    format: OutputFormat,
    text: impl FnOnce(&T) -> String,
) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::Text => Ok(text(data)),
    }
}

/// Human-readable validation report.
#[must_use]
pub fn validation_text(result: &ValidationResult) -> String {
    let mut out = String::new();

    let verdict = if result.is_valid {
        "VALID".green().bold()
    } else {
        "REJECTED".red().bold()
    };
    let _ = writeln!(
        out,
        "{verdict}  score {}/100  ({} ms)",
        score_colored(result.security_score),
        result.duration_ms
    );

    out.push_str(&"Layers:".bold().to_string());
    out.push('\n');
    for (name, layer) in &result.layer_results {
        let state = match layer.state {
            LayerState::Pass => "pass".green(),
            LayerState::Fail => "fail".red(),
            LayerState::NotApplicable => "n/a".dimmed(),
        };
        let _ = write!(out, "  {:<20} {state}", name.as_str());
        if layer.penalty > 0 {
            let _ = write!(out, " (-{})", layer.penalty);
        }
        out.push('\n');
    }

    push_list(&mut out, "Issues:", &result.issues, |s| s.red().to_string());
    push_list(&mut out, "Warnings:", &result.warnings, |s| s.yellow().to_string());

    if let Some(execution) = &result.sandbox_result {
        out.push_str(&sandbox_text(execution));
    }

    out.trim_end().to_string()
}

fn sandbox_text(execution: &SandboxExecutionResult) -> String {
    let mut out = String::new();
    out.push_str(&"Sandbox:".bold().to_string());
    out.push('\n');
    match &execution.failure {
        None => {
            let _ = writeln!(out, "  exited 0 in {} ms", execution.execution_time_ms);
        }
        Some(failure) => {
            let _ = writeln!(out, "  {failure}");
        }
    }
    for (label, stream) in [("stdout", &execution.stdout), ("stderr", &execution.stderr)] {
        if stream.trim().is_empty() {
            continue;
        }
        let _ = writeln!(out, "  {label}:");
        for line in preview(stream).lines() {
            let _ = writeln!(out, "    {}", line.dimmed());
        }
    }
    if execution.resource_usage.output_truncated {
        let _ = writeln!(out, "  {}", "(output truncated)".yellow());
    }
    out
}

/// Human-readable provider table.
#[must_use]
pub fn providers_text(stats: &RouterStats) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10} {:<28} {:<8} {:>8} {:>8} {:>10}",
        "PROVIDER".bold(),
        "MODEL".bold(),
        "PRIORITY".bold(),
        "REQUESTS".bold(),
        "ERRORS".bold(),
        "STATUS".bold()
    );
    for provider in &stats.providers {
        let _ = writeln!(out, "{}", provider_row(provider, &stats.fallback_order));
    }

    if stats.fallback_order.is_empty() {
        let _ = write!(out, "{}", "No providers available".red());
    } else {
        let _ = write!(out, "Fallback order: {}", stats.fallback_order.join(" -> "));
    }
    out
}

fn provider_row(provider: &ProviderStats, order: &[String]) -> String {
    let status = if !provider.enabled {
        "disabled".dimmed()
    } else if order.contains(&provider.name) {
        "available".green()
    } else {
        "unavailable".yellow()
    };
    format!(
        "{:<10} {:<28} {:<8} {:>8} {:>8} {:>10}",
        provider.name,
        provider.model,
        provider.priority,
        provider.request_count,
        provider.error_count,
        status
    )
}

/// Human-readable generation report.
#[must_use]
pub fn generation_text(
    code: &str,
    validation: Option<&ValidationResult>,
    written_to: Option<&str>,
) -> String {
    let mut out = String::new();
    out.push_str(code);
    out.push('\n');
    if let Some(result) = validation {
        out.push('\n');
        out.push_str(&validation_text(result));
        out.push('\n');
    }
    if let Some(path) = written_to {
        let _ = writeln!(out, "{} {path}", "Written to".green());
    }
    out.trim_end().to_string()
}

fn push_list(out: &mut String, title: &str, items: &[String], paint: impl Fn(&str) -> String) {
    if items.is_empty() {
        return;
    }
    out.push_str(&title.bold().to_string());
    out.push('\n');
    for item in items {
        let _ = writeln!(out, "  - {}", paint(item));
    }
}

fn score_colored(score: u32) -> String {
    let text = score.to_string();
    match score {
        90.. => text.green().to_string(),
        70..=89 => text.yellow().to_string(),
        _ => text.red().to_string(),
    }
}

fn preview(stream: &str) -> String {
    if stream.chars().count() <= OUTPUT_PREVIEW_CHARS {
        stream.to_string()
    } else {
        let mut cut: String = stream.chars().take(OUTPUT_PREVIEW_CHARS).collect();
        cut.push_str("\n...");
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evolve_core::{LayerName, LayerResult};
    use std::collections::BTreeMap;

    fn result(is_valid: bool) -> ValidationResult {
        let mut layer_results = BTreeMap::new();
        layer_results.insert(LayerName::InputSanitization, LayerResult::pass());
        layer_results.insert(
            LayerName::StaticScan,
            LayerResult::fail(vec!["Import not in allowed list: os".to_string()], 25),
        );
        ValidationResult {
            is_valid,
            security_score: 75,
            issues: vec!["Import not in allowed list: os".to_string()],
            warnings: vec!["User input was sanitized".to_string()],
            layer_results,
            sandbox_result: None,
            duration_ms: 12,
        }
    }

    #[test]
    fn test_validation_text_lists_everything() {
        colored::control::set_override(false);
        let text = validation_text(&result(false));

        assert!(text.starts_with("REJECTED  score 75/100  (12 ms)"));
        assert!(text.contains("static_scan"));
        assert!(text.contains("fail (-25)"));
        assert!(text.contains("  - Import not in allowed list: os"));
        assert!(text.contains("Warnings:"));
        assert!(!text.contains("Sandbox:"));
    }

    #[test]
    fn test_validation_json_shape() {
        let json = render(&result(true), OutputFormat::Json, validation_text).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["is_valid"], true);
        assert_eq!(value["security_score"], 75);
        assert!(value["layer_results"]["static_scan"].is_object());
    }

    #[test]
    fn test_sandbox_section() {
        colored::control::set_override(false);
        let mut result = result(true);
        result.sandbox_result = Some(SandboxExecutionResult {
            success: true,
            stdout: "hello\n".to_string(),
            stderr: String::new(),
            exit_code: Some(0),
            execution_time_ms: 40,
            resource_usage: evolve_core::ResourceUsage::default(),
            failure: None,
        });

        let text = validation_text(&result);
        assert!(text.contains("Sandbox:"));
        assert!(text.contains("exited 0 in 40 ms"));
        assert!(text.contains("    hello"));
        assert!(!text.contains("stderr:"));
    }

    #[test]
    fn test_providers_text() {
        colored::control::set_override(false);
        let stats = RouterStats::new(
            vec![
                ProviderStats::new("gemini", "gemini-pro", true, 1),
                ProviderStats::new("local", "llama2", false, 4),
            ],
            vec!["gemini".to_string()],
        );

        let text = providers_text(&stats);
        assert!(text.contains("available"));
        assert!(text.contains("disabled"));
        assert!(text.ends_with("Fallback order: gemini"));
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(OUTPUT_PREVIEW_CHARS + 10);
        assert!(preview(&long).ends_with("\n..."));
        assert_eq!(preview("short"), "short");
    }
}
