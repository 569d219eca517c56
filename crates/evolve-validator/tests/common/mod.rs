//! Scripted provider and sandbox fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use evolve_core::{
    Language, ProviderConfig, ProviderKind, ResourceUsage, Result, SandboxConfig,
    SandboxExecutionResult, SandboxFailure,
};
use evolve_llm::{
    Completion, CompletionRequest, Provider, ProviderError, ProviderRouter, ProviderRuntimeStats,
    RetryPolicy,
};
use evolve_sandbox::Sandbox;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Provider answering from a script, one entry per call.
#[derive(Debug)]
pub struct ScriptedProvider {
    config: ProviderConfig,
    stats: ProviderRuntimeStats,
    enabled: AtomicBool,
    answers: Mutex<VecDeque<std::result::Result<String, u16>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    /// `Ok(text)` answers with text; `Err(status)` fails with that HTTP status.
    pub fn new(answers: Vec<std::result::Result<&str, u16>>) -> Arc<Self> {
        let mut config = ProviderConfig::builtin(ProviderKind::OpenAi);
        config.name = "scripted".to_string();
        config.model = "scripted-model".to_string();
        Arc::new(Self {
            config,
            stats: ProviderRuntimeStats::default(),
            enabled: AtomicBool::new(true),
            answers: Mutex::new(
                answers
                    .into_iter()
                    .map(|a| a.map(str::to_string))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn answering(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(text)])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn runtime_stats(&self) -> &ProviderRuntimeStats {
        &self.stats
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    async fn is_available(&self) -> bool {
        self.is_enabled()
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<Completion, ProviderError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let next = {
            let mut answers = self.answers.lock().unwrap();
            if answers.len() > 1 {
                answers.pop_front()
            } else {
                answers.front().cloned()
            }
        };
        match next {
            Some(Ok(content)) => Ok(Completion {
                content,
                tokens_used: Some(1),
            }),
            Some(Err(status)) => Err(ProviderError::Api {
                status,
                body: "scripted failure".to_string(),
            }),
            None => Err(ProviderError::EmptyResponse {
                provider: self.config.name.clone(),
            }),
        }
    }
}

/// Router over one scripted provider with no retry delay.
pub fn router(provider: &Arc<ScriptedProvider>) -> Arc<ProviderRouter> {
    Arc::new(ProviderRouter::with_retry_policy(
        vec![Arc::clone(provider) as Arc<dyn Provider>],
        RetryPolicy::default().with_delay(Duration::ZERO),
    ))
}

/// What the fake sandbox does when asked to execute.
#[derive(Debug, Clone)]
pub enum SandboxScript {
    Succeed { stdout: String, elapsed_ms: u64 },
    Timeout,
    Exit(i32),
    /// Reports the substrate missing only at execution time.
    VanishOnExecute,
    /// Runs until cancelled.
    Hang,
}

#[derive(Debug)]
pub struct FakeSandbox {
    available: bool,
    script: SandboxScript,
    executions: AtomicU32,
    seen: Mutex<Option<(String, SandboxConfig)>>,
}

impl FakeSandbox {
    pub fn new(script: SandboxScript) -> Arc<Self> {
        Arc::new(Self {
            available: true,
            script,
            executions: AtomicU32::new(0),
            seen: Mutex::new(None),
        })
    }

    pub fn succeeding(stdout: &str) -> Arc<Self> {
        Self::new(SandboxScript::Succeed {
            stdout: stdout.to_string(),
            elapsed_ms: 40,
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            available: false,
            script: SandboxScript::Exit(0),
            executions: AtomicU32::new(0),
            seen: Mutex::new(None),
        })
    }

    pub fn executions(&self) -> u32 {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Option<(String, SandboxConfig)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sandbox for FakeSandbox {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn execute(
        &self,
        code: &str,
        _language: Language,
        config: &SandboxConfig,
        cancel: &CancellationToken,
    ) -> SandboxExecutionResult {
        self.executions.fetch_add(1, Ordering::SeqCst);
        *self.seen.lock().unwrap() = Some((code.to_string(), config.clone()));

        match &self.script {
            SandboxScript::Succeed { stdout, elapsed_ms } => SandboxExecutionResult {
                success: true,
                stdout: stdout.clone(),
                stderr: String::new(),
                exit_code: Some(0),
                execution_time_ms: *elapsed_ms,
                resource_usage: ResourceUsage {
                    wall_time_ms: *elapsed_ms,
                    stdout_bytes: stdout.len(),
                    ..ResourceUsage::default()
                },
                failure: None,
            },
            SandboxScript::Timeout => SandboxExecutionResult::failed(
                SandboxFailure::Timeout {
                    timeout_secs: config.timeout_secs,
                },
                config.timeout_secs * 1000,
            ),
            SandboxScript::Exit(code) => SandboxExecutionResult {
                exit_code: Some(*code),
                ..SandboxExecutionResult::failed(SandboxFailure::NonZeroExit { exit_code: *code }, 5)
            },
            SandboxScript::VanishOnExecute => {
                SandboxExecutionResult::unavailable("daemon went away")
            }
            SandboxScript::Hang => {
                cancel.cancelled().await;
                SandboxExecutionResult::failed(SandboxFailure::Cancelled, 0)
            }
        }
    }

    async fn cleanup(&self) -> Result<usize> {
        Ok(usize::try_from(self.executions()).unwrap_or_default())
    }
}
