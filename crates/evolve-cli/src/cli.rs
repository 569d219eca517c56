//! CLI argument definitions and parsing.
//!
//! - `Cli` - global flags and the chosen subcommand
//! - `Commands` - `validate`, `generate`, `providers`, `completions`

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use evolve_core::Language;
use std::path::PathBuf;

use crate::OutputFormat;
use crate::logging::LogOptions;

/// evolve - validate machine-generated code before it runs.
///
/// Code passes through input sanitization, a static scan, an LLM security
/// review, complexity limits, and a Docker sandbox run.
#[derive(Parser, Debug)]
#[command(name = "evolve")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Configuration file (default: <config dir>/evolve/config.toml)
    #[arg(short, long, global = true, env = "EVOLVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Also write JSON logs to this file
    #[arg(long, global = true, env = "EVOLVE_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Logging settings selected by the global flags.
    #[must_use]
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            verbose: self.verbose,
            json: self.log_json,
            file: self.log_file.clone(),
        }
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a source file.
    ///
    /// Exits with status 0 when the code is accepted and 3 when it is
    /// rejected.
    ///
    /// # Examples
    ///
    /// ```bash
    /// evolve validate script.py
    /// evolve validate script.py --input "list files in a folder"
    /// cat script.py | evolve validate - --no-sandbox
    /// ```
    Validate {
        /// Source file, or `-` for standard input
        file: PathBuf,

        /// The request the code was generated for
        #[arg(short, long, default_value = "")]
        input: String,

        /// Source language (default: from the file extension, then config)
        #[arg(short, long)]
        language: Option<Language>,

        /// Skip the sandbox run
        #[arg(long)]
        no_sandbox: bool,

        /// Sandbox timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Sandbox memory limit in megabytes
        #[arg(long)]
        memory_mb: Option<u64>,

        /// Give the sandbox network access
        #[arg(long)]
        allow_network: bool,
    },

    /// Generate code from a description.
    ///
    /// # Examples
    ///
    /// ```bash
    /// evolve generate "a command that prints today's date"
    /// evolve generate "word counter" --output wc.py
    /// ```
    Generate {
        /// What the code should do
        description: String,

        /// Validate the generated code (implied by --output)
        #[arg(long)]
        validate: bool,

        /// Validate, then write the code to this file unless rejected
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List LLM providers, their availability, and the fallback order.
    Providers,

    /// Generate shell completions.
    ///
    /// ```bash
    /// evolve completions bash > ~/.local/share/bash-completion/completions/evolve
    /// ```
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_validate() {
        let cli = Cli::parse_from(["evolve", "validate", "script.py"]);
        if let Commands::Validate {
            file,
            input,
            language,
            no_sandbox,
            timeout,
            memory_mb,
            allow_network,
        } = cli.command
        {
            assert_eq!(file, PathBuf::from("script.py"));
            assert!(input.is_empty());
            assert!(language.is_none());
            assert!(!no_sandbox);
            assert!(timeout.is_none());
            assert!(memory_mb.is_none());
            assert!(!allow_network);
        } else {
            panic!("Expected Validate command");
        }
    }

    #[test]
    fn test_cli_parsing_validate_all_options() {
        let cli = Cli::parse_from([
            "evolve",
            "validate",
            "-",
            "--input",
            "say hi",
            "--language",
            "node",
            "--no-sandbox",
            "--timeout",
            "5",
            "--memory-mb",
            "64",
            "--allow-network",
        ]);
        if let Commands::Validate {
            file,
            input,
            language,
            no_sandbox,
            timeout,
            memory_mb,
            allow_network,
        } = cli.command
        {
            assert_eq!(file, PathBuf::from("-"));
            assert_eq!(input, "say hi");
            assert_eq!(language, Some(Language::Javascript));
            assert!(no_sandbox);
            assert_eq!(timeout, Some(5));
            assert_eq!(memory_mb, Some(64));
            assert!(allow_network);
        } else {
            panic!("Expected Validate command");
        }
    }

    #[test]
    fn test_cli_rejects_unknown_language() {
        let result = Cli::try_parse_from(["evolve", "validate", "a.x", "--language", "cobol"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parsing_generate() {
        let cli = Cli::parse_from([
            "evolve",
            "generate",
            "print the date",
            "--validate",
            "-o",
            "/tmp/date.py",
        ]);
        if let Commands::Generate {
            description,
            validate,
            output,
        } = cli.command
        {
            assert_eq!(description, "print the date");
            assert!(validate);
            assert_eq!(output, Some(PathBuf::from("/tmp/date.py")));
        } else {
            panic!("Expected Generate command");
        }
    }

    #[test]
    fn test_cli_parsing_providers() {
        let cli = Cli::parse_from(["evolve", "providers"]);
        assert!(matches!(cli.command, Commands::Providers));
    }

    #[test]
    fn test_cli_parsing_completions() {
        let cli = Cli::parse_from(["evolve", "completions", "zsh"]);
        if let Commands::Completions { shell } = cli.command {
            assert_eq!(shell, Shell::Zsh);
        } else {
            panic!("Expected Completions command");
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "evolve",
            "providers",
            "--verbose",
            "--format",
            "json",
            "--config",
            "/etc/evolve.toml",
            "--log-json",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/evolve.toml")));

        let options = cli.log_options();
        assert!(options.verbose);
        assert!(options.json);
    }

    #[test]
    fn test_cli_output_format_default() {
        let cli = Cli::parse_from(["evolve", "providers"]);
        assert_eq!(cli.format, OutputFormat::Text);
    }
}
