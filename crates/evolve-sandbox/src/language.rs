//! Per-language execution profiles.

use evolve_core::Language;

/// How code in one language is placed and run inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageProfile {
    /// Language this profile runs
    pub language: Language,
    /// Container image
    pub image: &'static str,
    /// Shell command run inside the container; `{file}` is the source path
    pub command: &'static str,
    /// Whether the run writes and executes a binary under `/tmp`
    pub compiles: bool,
}

const PROFILES: [LanguageProfile; 5] = [
    LanguageProfile {
        language: Language::Python,
        image: "python:3.11-alpine",
        command: "python3 {file}",
        compiles: false,
    },
    LanguageProfile {
        language: Language::Javascript,
        image: "node:18-alpine",
        command: "node {file}",
        compiles: false,
    },
    LanguageProfile {
        language: Language::Bash,
        image: "alpine:latest",
        command: "sh {file}",
        compiles: false,
    },
    LanguageProfile {
        language: Language::C,
        image: "gcc:alpine",
        command: "gcc -o /tmp/program {file} && /tmp/program",
        compiles: true,
    },
    LanguageProfile {
        language: Language::Cpp,
        image: "gcc:alpine",
        command: "g++ -o /tmp/program {file} && /tmp/program",
        compiles: true,
    },
];

impl LanguageProfile {
    /// Looks up the profile for a language.
    #[must_use]
    pub fn for_language(language: Language) -> &'static Self {
        PROFILES
            .iter()
            .find(|p| p.language == language)
            .unwrap_or(&PROFILES[0])
    }

    /// Source file name inside the code mount.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("main.{}", self.language.extension())
    }

    /// Command with the source path substituted.
    #[must_use]
    pub fn command_for(&self, source_path: &str) -> String {
        self.command.replace("{file}", source_path)
    }
}
