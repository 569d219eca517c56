//! Tracing subscriber setup for the binary.
//!
//! Logs go to stderr so command output on stdout stays parseable. An
//! optional file sink writes JSON lines through a non-blocking appender;
//! the returned guard must live until the process exits or buffered lines
//! are lost.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging settings chosen on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Debug level regardless of `RUST_LOG`
    pub verbose: bool,
    /// JSON lines on stderr
    pub json: bool,
    /// Additional JSON log file
    pub file: Option<PathBuf>,
}

/// Builds the level filter.
///
/// `--verbose` forces `debug`; otherwise `RUST_LOG` applies, falling back
/// to `warn` so reports are not buried in progress lines.
#[must_use]
pub fn build_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if the log file path is unusable or a subscriber is
/// already installed.
pub fn init(options: &LogOptions) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match &options.file {
        Some(path) => {
            let (directory, file_name) = split_log_path(path)?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = if options.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(build_filter(options.verbose))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf)> {
    let file_name = path
        .file_name()
        .with_context(|| format!("log file path has no file name: {}", path.display()))?;
    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((directory.to_path_buf(), PathBuf::from(file_name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_filter() {
        assert!(build_filter(true).to_string().contains("debug"));
    }

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/evolve.jsonl")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log"));
        assert_eq!(name, PathBuf::from("evolve.jsonl"));

        let (dir, name) = split_log_path(Path::new("evolve.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, PathBuf::from("evolve.log"));
    }

    #[test]
    fn test_split_log_path_without_file_name() {
        assert!(split_log_path(Path::new("/")).is_err());
    }
}
