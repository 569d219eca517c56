//! Configuration types for evolve.
//!
//! Every section deserializes from TOML with `#[serde(default)]`, so a
//! user file only needs to name the values it overrides. The defaults
//! below are the ones the validator ships with.
//!
//! # Examples
//!
//! ```
//! use evolve_core::EvolveConfig;
//!
//! let config = EvolveConfig::from_toml_str(
//!     r#"
//!     [validation]
//!     min_security_score = 80
//!
//!     [llm.providers.openai]
//!     priority = 1
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.validation.min_security_score, 80);
//! assert_eq!(config.complexity.max_lines, 100);
//! ```

use crate::{Error, Language, LayerName, MemoryLimit, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Top-level configuration, one section per component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolveConfig {
    /// Verdict and pipeline switches
    pub validation: ValidationConfig,
    /// Static scanner lists
    pub scanner: ScannerConfig,
    /// Complexity ceilings
    pub complexity: ComplexityConfig,
    /// Per-layer penalties
    pub scoring: ScoringPolicy,
    /// Provider table and retry budget
    pub llm: LlmConfig,
    /// Sandbox resource envelope
    pub sandbox: SandboxConfig,
}

impl EvolveConfig {
    /// Parses a configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the text is not valid TOML, does not
    /// match the schema, or fails [`validate`](Self::validate).
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::ConfigError {
            message: format!("Invalid configuration: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SerializationError`] if a value cannot be represented.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::SerializationError {
            message: e.to_string(),
        })
    }

    /// Checks cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.validation.min_security_score > 100 {
            return Err(config_error(format!(
                "validation.min_security_score must be 0..=100, got {}",
                self.validation.min_security_score
            )));
        }
        if self.validation.max_input_length == 0 {
            return Err(config_error("validation.max_input_length must be positive"));
        }
        if self.complexity.max_lines == 0 {
            return Err(config_error("complexity.max_lines must be positive"));
        }
        if !(1..=LlmConfig::MAX_RETRIES_LIMIT).contains(&self.llm.max_retries) {
            return Err(config_error(format!(
                "llm.max_retries must be within 1..={}, got {}",
                LlmConfig::MAX_RETRIES_LIMIT,
                self.llm.max_retries
            )));
        }
        if self.llm.retry_delay_ms > LlmConfig::MAX_RETRY_DELAY_MS {
            return Err(config_error(format!(
                "llm.retry_delay_ms must be at most {}, got {}",
                LlmConfig::MAX_RETRY_DELAY_MS,
                self.llm.retry_delay_ms
            )));
        }
        for (name, overrides) in &self.llm.providers {
            if let Some(t) = overrides.temperature
                && !(0.0..=2.0).contains(&t)
            {
                return Err(config_error(format!(
                    "llm.providers.{name}.temperature must be within 0.0..=2.0, got {t}"
                )));
            }
            if overrides.timeout_secs == Some(0) {
                return Err(config_error(format!(
                    "llm.providers.{name}.timeout_secs must be positive"
                )));
            }
        }
        self.sandbox.validate()
    }
}

fn config_error(message: impl Into<String>) -> Error {
    Error::ConfigError {
        message: message.into(),
    }
}

/// Verdict threshold and pipeline switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum security score for a valid verdict.
    ///
    /// Default: 70
    pub min_security_score: u32,

    /// Maximum length of sanitized user input, in characters.
    ///
    /// Default: 10000
    pub max_input_length: usize,

    /// Run the remote semantic judgment layer.
    ///
    /// Default: true
    pub llm_validation: bool,

    /// Run the sandbox execution layer.
    ///
    /// Default: true
    pub sandbox_execution: bool,

    /// Language of submitted code.
    ///
    /// Default: python
    pub language: Language,

    /// Successful sandbox runs longer than this produce a warning.
    ///
    /// Default: 10 seconds
    pub long_execution_warning_secs: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_security_score: 70,
            max_input_length: 10_000,
            llm_validation: true,
            sandbox_execution: true,
            language: Language::Python,
            long_execution_warning_secs: 10,
        }
    }
}

impl ValidationConfig {
    /// Returns the long-execution warning threshold.
    #[must_use]
    pub const fn long_execution_warning(&self) -> Duration {
        Duration::from_secs(self.long_execution_warning_secs)
    }
}

/// Lists consulted by the static scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Builtins whose direct call is a violation.
    pub dangerous_functions: Vec<String>,
    /// Modules whose import or attribute use is a violation.
    pub dangerous_modules: Vec<String>,
    /// Attribute names whose access is a violation on any object.
    pub dangerous_attributes: Vec<String>,
    /// Top-level modules that may be imported.
    pub allowed_imports: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            dangerous_functions: strings(&[
                "eval",
                "exec",
                "compile",
                "__import__",
                "open",
                "file",
                "input",
                "raw_input",
            ]),
            dangerous_modules: strings(&[
                "os",
                "sys",
                "subprocess",
                "shutil",
                "socket",
                "urllib",
                "requests",
                "http",
            ]),
            dangerous_attributes: strings(&[
                "__globals__",
                "__builtins__",
                "__subclasses__",
                "__code__",
                "__bases__",
                "__mro__",
                "f_globals",
                "f_locals",
                "gi_frame",
            ]),
            allowed_imports: strings(&[
                "click",
                "pathlib",
                "typing",
                "dataclasses",
                "json",
                "yaml",
                "datetime",
                "time",
                "math",
                "random",
                "string",
                "collections",
            ]),
        }
    }
}

/// Ceilings for the complexity analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityConfig {
    /// Maximum composite score (loops + conditionals + functions).
    pub max_complexity: usize,
    /// Maximum non-blank lines.
    pub max_lines: usize,
    /// Maximum function definitions.
    pub max_functions: usize,
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            max_complexity: 10,
            max_lines: 100,
            max_functions: 5,
        }
    }
}

/// Penalties deducted from the security score.
///
/// `*_penalty` applies when a layer reports a failure; `*_error_penalty`
/// applies when the layer itself could not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Dangerous pattern found by the sanitization layer. Default: 30
    pub sanitization_penalty: u32,
    /// Violation found by the static scan. Default: 25
    pub static_scan_penalty: u32,
    /// Provider judged the code unsafe. Default: 20
    pub semantic_penalty: u32,
    /// Semantic judgment call failed. Default: 15
    pub semantic_error_penalty: u32,
    /// Per complexity issue. Default: 10
    pub complexity_issue_penalty: u32,
    /// Sandbox available and execution failed. Default: 15
    pub sandbox_penalty: u32,
    /// Sanitization layer internal error. Default: 20
    pub sanitization_error_penalty: u32,
    /// Static scan internal error. Default: 20
    pub static_scan_error_penalty: u32,
    /// Complexity layer internal error. Default: 10
    pub complexity_error_penalty: u32,
    /// Sandbox layer internal error. Default: 10
    pub sandbox_error_penalty: u32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            sanitization_penalty: 30,
            static_scan_penalty: 25,
            semantic_penalty: 20,
            semantic_error_penalty: 15,
            complexity_issue_penalty: 10,
            sandbox_penalty: 15,
            sanitization_error_penalty: 20,
            static_scan_error_penalty: 20,
            complexity_error_penalty: 10,
            sandbox_error_penalty: 10,
        }
    }
}

impl ScoringPolicy {
    /// Penalty applied when `layer` could not complete.
    #[must_use]
    pub const fn error_penalty(&self, layer: LayerName) -> u32 {
        match layer {
            LayerName::InputSanitization => self.sanitization_error_penalty,
            LayerName::StaticScan => self.static_scan_error_penalty,
            LayerName::LlmValidation => self.semantic_error_penalty,
            LayerName::ComplexityAnalysis => self.complexity_error_penalty,
            LayerName::SandboxExecution => self.sandbox_error_penalty,
        }
    }
}

/// Backend family of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini `generateContent`
    Gemini,
    /// OpenAI chat completions
    OpenAi,
    /// Anthropic messages API
    Anthropic,
    /// Locally hosted Ollama-compatible server
    Local,
}

impl ProviderKind {
    /// Name used as the provider key in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Local => "local",
        }
    }

    /// Looks up a kind by its configuration name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gemini" => Some(Self::Gemini),
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            "local" => Some(Self::Local),
            _ => None,
        }
    }

    /// Returns `true` if the backend needs an API key.
    #[must_use]
    pub const fn requires_credential(self) -> bool {
        !matches!(self, Self::Local)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved settings of one provider.
///
/// Built once per process from the defaults table merged with user
/// overrides. Only `enabled` changes afterwards, and that lives on the
/// provider client.
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    /// Provider name (configuration key)
    pub name: String,
    /// Backend family
    pub kind: ProviderKind,
    /// Model identifier sent to the backend
    pub model: String,
    /// Inline API key, if configured
    pub api_key: Option<String>,
    /// Environment variables consulted, in order, when no inline key is set
    pub api_key_env: Vec<String>,
    /// Endpoint override; the backend's public endpoint when `None`
    pub base_url: Option<String>,
    /// Per-call timeout
    pub timeout: Duration,
    /// Maximum generated tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Initial enabled flag
    pub enabled: bool,
    /// Lower is preferred
    pub priority: u32,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("enabled", &self.enabled)
            .field("priority", &self.priority)
            .finish()
    }
}

impl ProviderConfig {
    /// Default per-call timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default token ceiling.
    pub const DEFAULT_MAX_TOKENS: u32 = 2000;
    /// Default temperature.
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;

    /// Built-in settings for a backend family.
    ///
    /// # Examples
    ///
    /// ```
    /// use evolve_core::{ProviderConfig, ProviderKind};
    ///
    /// let local = ProviderConfig::builtin(ProviderKind::Local);
    /// assert_eq!(local.model, "llama2");
    /// assert_eq!(local.priority, 4);
    /// assert!(local.api_key_env.is_empty());
    /// ```
    #[must_use]
    pub fn builtin(kind: ProviderKind) -> Self {
        let (model, priority, env, base_url): (&str, u32, &[&str], Option<&str>) = match kind {
            ProviderKind::Gemini => (
                "gemini-2.0-flash",
                1,
                &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
                None,
            ),
            ProviderKind::OpenAi => ("gpt-3.5-turbo", 2, &["OPENAI_API_KEY"], None),
            ProviderKind::Anthropic => (
                "claude-3-sonnet-20240229",
                3,
                &["ANTHROPIC_API_KEY"],
                None,
            ),
            ProviderKind::Local => ("llama2", 4, &[], Some("http://localhost:11434")),
        };

        Self {
            name: kind.as_str().to_string(),
            kind,
            model: model.to_string(),
            api_key: None,
            api_key_env: strings(env),
            base_url: base_url.map(str::to_string),
            timeout: Self::DEFAULT_TIMEOUT,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            temperature: Self::DEFAULT_TEMPERATURE,
            enabled: true,
            priority,
        }
    }

    fn apply(&mut self, overrides: &ProviderOverride) {
        if let Some(model) = &overrides.model {
            self.model.clone_from(model);
        }
        if let Some(key) = &overrides.api_key {
            self.api_key = Some(key.clone());
        }
        if let Some(env) = &overrides.api_key_env {
            self.api_key_env.clone_from(env);
        }
        if let Some(url) = &overrides.base_url {
            self.base_url = Some(url.clone());
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(max_tokens) = overrides.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(temperature) = overrides.temperature {
            self.temperature = temperature;
        }
        if let Some(enabled) = overrides.enabled {
            self.enabled = enabled;
        }
        if let Some(priority) = overrides.priority {
            self.priority = priority;
        }
    }
}

/// User overrides for one provider. Unset fields keep the built-in value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOverride {
    /// Model identifier
    pub model: Option<String>,
    /// Inline API key
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Environment variable names to read the key from
    pub api_key_env: Option<Vec<String>>,
    /// Endpoint override
    pub base_url: Option<String>,
    /// Per-call timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Maximum generated tokens
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Enabled flag
    pub enabled: Option<bool>,
    /// Priority (lower is preferred)
    pub priority: Option<u32>,
}

/// Provider table and router retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Overrides keyed by provider name (`gemini`, `openai`, `anthropic`, `local`).
    pub providers: BTreeMap<String, ProviderOverride>,
    /// Attempts per provider before moving on. Default: 3
    pub max_retries: u32,
    /// Fixed delay between attempts, in milliseconds. Default: 1000
    pub retry_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            providers: BTreeMap::new(),
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl LlmConfig {
    /// Ceiling on `max_retries`.
    pub const MAX_RETRIES_LIMIT: u32 = 10;
    /// Ceiling on `retry_delay_ms`.
    pub const MAX_RETRY_DELAY_MS: u64 = 60_000;

    /// Merges the built-in provider table with user overrides.
    ///
    /// Unknown provider names are skipped with a warning.
    ///
    /// # Examples
    ///
    /// ```
    /// use evolve_core::{LlmConfig, ProviderOverride};
    ///
    /// let mut config = LlmConfig::default();
    /// config.providers.insert(
    ///     "anthropic".to_string(),
    ///     ProviderOverride { priority: Some(0), ..Default::default() },
    /// );
    ///
    /// let providers = config.provider_configs();
    /// assert_eq!(providers.len(), 4);
    /// let anthropic = providers.iter().find(|p| p.name == "anthropic").unwrap();
    /// assert_eq!(anthropic.priority, 0);
    /// ```
    #[must_use]
    pub fn provider_configs(&self) -> Vec<ProviderConfig> {
        for name in self.providers.keys() {
            if ProviderKind::from_name(name).is_none() {
                tracing::warn!(provider = %name, "Ignoring unknown provider in configuration");
            }
        }

        [
            ProviderKind::Gemini,
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::Local,
        ]
        .into_iter()
        .map(|kind| {
            let mut config = ProviderConfig::builtin(kind);
            if let Some(overrides) = self.providers.get(kind.as_str()) {
                config.apply(overrides);
            }
            config
        })
        .collect()
    }

    /// Returns the inter-attempt delay.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Resource envelope for sandboxed execution.
///
/// Supplied once per validator; callers may pass an override per request.
///
/// # Examples
///
/// ```
/// use evolve_core::SandboxConfig;
/// use std::time::Duration;
///
/// let config = SandboxConfig::builder()
///     .memory_limit_mb(256)
///     .timeout(Duration::from_secs(5))
///     .build();
///
/// assert_eq!(config.memory_limit.megabytes(), 256);
/// assert!(config.network_disabled);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Memory ceiling. Default: 128m
    pub memory_limit: MemoryLimit,
    /// CPU share in cores. Default: 0.5
    pub cpu_limit: f64,
    /// Wall-clock timeout in seconds. Default: 30
    pub timeout_secs: u64,
    /// Disable networking. Default: true
    pub network_disabled: bool,
    /// Mount the root filesystem read-only. Default: true
    pub read_only: bool,
    /// Size of the writable `/tmp`. Default: 10m
    pub tmp_size: MemoryLimit,
    /// Largest file the code may create. Default: 1m
    pub max_file_size: MemoryLimit,
    /// Captured bytes per output stream before truncation. Default: 1m
    pub max_output_size: MemoryLimit,
    /// Process count ceiling. Default: 32
    pub max_processes: u32,
    /// Open file descriptor ceiling. Default: 64
    pub max_open_files: u32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            memory_limit: MemoryLimit::from_mb(128),
            cpu_limit: 0.5,
            timeout_secs: 30,
            network_disabled: true,
            read_only: true,
            tmp_size: MemoryLimit::from_mb(10),
            max_file_size: MemoryLimit::from_mb(1),
            max_output_size: MemoryLimit::from_mb(1),
            max_processes: 32,
            max_open_files: 64,
        }
    }
}

impl SandboxConfig {
    /// Creates a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> SandboxConfigBuilder {
        SandboxConfigBuilder::default()
    }

    /// Returns the wall-clock timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Checks the envelope for values docker would reject.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.cpu_limit.is_nan() || self.cpu_limit <= 0.0 {
            return Err(config_error(format!(
                "sandbox.cpu_limit must be positive, got {}",
                self.cpu_limit
            )));
        }
        if self.timeout_secs == 0 {
            return Err(config_error("sandbox.timeout_secs must be positive"));
        }
        if self.memory_limit.bytes() < 6 * 1024 * 1024 {
            return Err(config_error(format!(
                "sandbox.memory_limit must be at least 6m, got {}",
                self.memory_limit
            )));
        }
        if self.max_processes == 0 || self.max_open_files == 0 {
            return Err(config_error(
                "sandbox.max_processes and sandbox.max_open_files must be positive",
            ));
        }
        Ok(())
    }
}

/// Builder for [`SandboxConfig`].
#[derive(Debug, Clone, Default)]
pub struct SandboxConfigBuilder {
    config: SandboxConfig,
}

impl SandboxConfigBuilder {
    /// Sets the memory ceiling in megabytes.
    #[must_use]
    pub const fn memory_limit_mb(mut self, mb: u64) -> Self {
        self.config.memory_limit = MemoryLimit::from_mb(mb);
        self
    }

    /// Sets the CPU share.
    #[must_use]
    pub const fn cpu_limit(mut self, cores: f64) -> Self {
        self.config.cpu_limit = cores;
        self
    }

    /// Sets the wall-clock timeout, rounded down to whole seconds (minimum 1).
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Enables or disables networking.
    #[must_use]
    pub const fn network_disabled(mut self, disabled: bool) -> Self {
        self.config.network_disabled = disabled;
        self
    }

    /// Sets the captured output ceiling per stream.
    #[must_use]
    pub const fn max_output_size(mut self, limit: MemoryLimit) -> Self {
        self.config.max_output_size = limit;
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> SandboxConfig {
        self.config
    }
}
