//! Domain types shared across the workspace.
//!
//! Strong types over primitives: source languages accepted by the sandbox,
//! byte-size limits parsed from docker-style strings (`"128m"`), and the
//! names of the five validation layers.
//!
//! # Examples
//!
//! ```
//! use evolve_core::{Language, MemoryLimit};
//!
//! let lang: Language = "python".parse().unwrap();
//! assert_eq!(lang.extension(), "py");
//!
//! let limit: MemoryLimit = "128m".parse().unwrap();
//! assert_eq!(limit.bytes(), 128 * 1024 * 1024);
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source language of code submitted for validation or execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python 3
    #[default]
    Python,
    /// JavaScript on Node.js
    Javascript,
    /// POSIX shell script run by bash
    Bash,
    /// C compiled with gcc
    C,
    /// C++ compiled with g++
    Cpp,
}

impl Language {
    /// All supported languages, in table order.
    pub const ALL: [Self; 5] = [
        Self::Python,
        Self::Javascript,
        Self::Bash,
        Self::C,
        Self::Cpp,
    ];

    /// Lowercase identifier used in configuration and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Javascript => "javascript",
            Self::Bash => "bash",
            Self::C => "c",
            Self::Cpp => "cpp",
        }
    }

    /// Source file extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::Javascript => "js",
            Self::Bash => "sh",
            Self::C => "c",
            Self::Cpp => "cpp",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "py" | "python3" => Ok(Self::Python),
            "javascript" | "js" | "node" => Ok(Self::Javascript),
            "bash" | "sh" | "shell" => Ok(Self::Bash),
            "c" => Ok(Self::C),
            "cpp" | "c++" | "cxx" => Ok(Self::Cpp),
            other => Err(Error::ConfigError {
                message: format!("Unsupported language: {other}"),
            }),
        }
    }
}

/// Byte-size limit written in docker notation (`"128m"`, `"10m"`, `"1g"`).
///
/// Serializes back to the shortest exact suffix form.
///
/// # Examples
///
/// ```
/// use evolve_core::MemoryLimit;
///
/// let limit = MemoryLimit::from_mb(10);
/// assert_eq!(limit.to_string(), "10m");
/// assert_eq!("1g".parse::<MemoryLimit>().unwrap().megabytes(), 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemoryLimit(u64);

impl MemoryLimit {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * 1024 * 1024;

    /// Creates a limit from a raw byte count.
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Creates a limit from megabytes.
    #[must_use]
    pub const fn from_mb(mb: u64) -> Self {
        Self(mb * Self::MIB)
    }

    /// Returns the limit in bytes.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.0
    }

    /// Returns the limit in whole megabytes, rounded down.
    #[must_use]
    pub const fn megabytes(self) -> u64 {
        self.0 / Self::MIB
    }
}

impl fmt::Display for MemoryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        if bytes != 0 && bytes % Self::GIB == 0 {
            write!(f, "{}g", bytes / Self::GIB)
        } else if bytes != 0 && bytes % Self::MIB == 0 {
            write!(f, "{}m", bytes / Self::MIB)
        } else if bytes != 0 && bytes % Self::KIB == 0 {
            write!(f, "{}k", bytes / Self::KIB)
        } else {
            write!(f, "{bytes}")
        }
    }
}

impl FromStr for MemoryLimit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().to_ascii_lowercase();
        let invalid = || Error::ConfigError {
            message: format!("Invalid size limit: '{s}' (expected e.g. 128m, 10m, 1g)"),
        };

        let trimmed = trimmed.strip_suffix('b').unwrap_or(&trimmed);
        let (digits, multiplier) = match trimmed.chars().last() {
            Some('k') => (&trimmed[..trimmed.len() - 1], Self::KIB),
            Some('m') => (&trimmed[..trimmed.len() - 1], Self::MIB),
            Some('g') => (&trimmed[..trimmed.len() - 1], Self::GIB),
            Some(c) if c.is_ascii_digit() => (trimmed, 1),
            _ => return Err(invalid()),
        };

        let value: u64 = digits.parse().map_err(|_| invalid())?;
        value.checked_mul(multiplier).map(Self).ok_or_else(invalid)
    }
}

impl TryFrom<String> for MemoryLimit {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MemoryLimit> for String {
    fn from(limit: MemoryLimit) -> Self {
        limit.to_string()
    }
}

/// Name of one validation layer.
///
/// The serialized names are the keys of [`ValidationResult::layer_results`](crate::ValidationResult).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerName {
    /// Injection filtering of user input and destructive-pattern check of code
    InputSanitization,
    /// Syntax-tree scan for dangerous calls, imports, and attributes
    StaticScan,
    /// Remote SAFE/UNSAFE judgment
    LlmValidation,
    /// Structural metrics and infinite-loop heuristic
    ComplexityAnalysis,
    /// Isolated execution under a resource envelope
    SandboxExecution,
}

impl LayerName {
    /// Layers in pipeline order.
    pub const ORDERED: [Self; 5] = [
        Self::InputSanitization,
        Self::StaticScan,
        Self::LlmValidation,
        Self::ComplexityAnalysis,
        Self::SandboxExecution,
    ];

    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputSanitization => "input_sanitization",
            Self::StaticScan => "static_scan",
            Self::LlmValidation => "llm_validation",
            Self::ComplexityAnalysis => "complexity_analysis",
            Self::SandboxExecution => "sandbox_execution",
        }
    }

    /// Returns `true` for layers whose failure alone rejects the code.
    #[must_use]
    pub const fn is_critical(self) -> bool {
        matches!(
            self,
            Self::InputSanitization | Self::StaticScan | Self::LlmValidation
        )
    }
}

impl fmt::Display for LayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_aliases() {
        assert_eq!("py".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("Node".parse::<Language>().unwrap(), Language::Javascript);
        assert_eq!("c++".parse::<Language>().unwrap(), Language::Cpp);
        assert!("cobol".parse::<Language>().unwrap_err().is_config_error());
    }

    #[test]
    fn test_language_serde_lowercase() {
        let json = serde_json::to_string(&Language::Javascript).unwrap();
        assert_eq!(json, "\"javascript\"");
    }

    #[test]
    fn test_memory_limit_parse() {
        assert_eq!("128m".parse::<MemoryLimit>().unwrap().megabytes(), 128);
        assert_eq!("128MB".parse::<MemoryLimit>().unwrap().megabytes(), 128);
        assert_eq!("64k".parse::<MemoryLimit>().unwrap().bytes(), 64 * 1024);
        assert_eq!("4096".parse::<MemoryLimit>().unwrap().bytes(), 4096);
        assert!("".parse::<MemoryLimit>().is_err());
        assert!("lots".parse::<MemoryLimit>().is_err());
        assert!("12x".parse::<MemoryLimit>().is_err());
    }

    #[test]
    fn test_memory_limit_display() {
        assert_eq!(MemoryLimit::from_mb(2048).to_string(), "2g");
        assert_eq!(MemoryLimit::from_bytes(1024 * 1024).to_string(), "1m");
        assert_eq!(MemoryLimit::from_bytes(1500).to_string(), "1500");
    }

    #[test]
    fn test_layer_names_are_stable() {
        let names: Vec<&str> = LayerName::ORDERED.iter().map(|l| l.as_str()).collect();
        assert_eq!(
            names,
            [
                "input_sanitization",
                "static_scan",
                "llm_validation",
                "complexity_analysis",
                "sandbox_execution"
            ]
        );
        let json = serde_json::to_string(&LayerName::StaticScan).unwrap();
        assert_eq!(json, "\"static_scan\"");
    }

    #[test]
    fn test_critical_layers() {
        assert!(LayerName::InputSanitization.is_critical());
        assert!(LayerName::StaticScan.is_critical());
        assert!(LayerName::LlmValidation.is_critical());
        assert!(!LayerName::ComplexityAnalysis.is_critical());
        assert!(!LayerName::SandboxExecution.is_critical());
    }
}
