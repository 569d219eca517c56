//! Shell completion generation command.

use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io::{self, Write};

use crate::ExitCode;
use crate::cli::Cli;

/// Writes the completion script for `shell` to `out`.
pub fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    generate(shell, &mut command, name, out);
}

/// Prints the completion script for `shell` to stdout.
pub fn run(shell: Shell) -> ExitCode {
    write_completions(shell, &mut io::stdout());
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(shell: Shell) -> String {
        let mut out = Vec::new();
        write_completions(shell, &mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_bash_completions_name_subcommands() {
        let script = script(Shell::Bash);
        assert!(script.contains("evolve"));
        assert!(script.contains("validate"));
        assert!(script.contains("providers"));
    }

    #[test]
    fn test_other_shells_generate() {
        for shell in [Shell::Zsh, Shell::Fish, Shell::PowerShell] {
            assert!(!script(shell).is_empty(), "{shell}");
        }
    }
}
