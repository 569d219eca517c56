//! Docker-backed sandbox.
//!
//! Each run gets a fresh container with the code mounted read-only from an
//! ephemeral directory. The container is labelled so that leftovers from
//! crashed runs can be removed with [`Sandbox::cleanup`]. A run that is
//! abandoned midway (future dropped, wait error) force-removes its
//! container in the background.
//!
//! Hardening applied to every run:
//! - `--network=none` and `--read-only` root filesystem (per envelope)
//! - `--cap-drop=ALL`, `no-new-privileges`, unprivileged user
//! - memory, CPU, process, open-file, and file-size ceilings
//! - size-limited tmpfs on `/tmp`

use crate::{LanguageProfile, Sandbox};
use async_trait::async_trait;
use evolve_core::{
    Error, Language, ResourceUsage, Result, SandboxConfig, SandboxExecutionResult, SandboxFailure,
};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Label carried by every container this sandbox starts.
pub const SANDBOX_LABEL: &str = "evolve-sandbox";

const CODE_MOUNT: &str = "/code";
const SANDBOX_USER: &str = "65534:65534";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const REMOVE_TIMEOUT: Duration = Duration::from_secs(10);
const DOCKER_RUN_FAILED: i32 = 125;

/// Client-side messages for a daemon that cannot be reached.
const DAEMON_UNREACHABLE: &[&str] = &[
    "cannot connect to the docker daemon",
    "is the docker daemon running",
    "error during connect",
];

/// Sandbox that runs code in short-lived docker containers.
///
/// # Examples
///
/// ```no_run
/// use evolve_core::{Language, SandboxConfig};
/// use evolve_sandbox::{DockerSandbox, Sandbox};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() {
/// let sandbox = DockerSandbox::new();
/// let result = sandbox
///     .execute("print('hi')", Language::Python, &SandboxConfig::default(), &CancellationToken::new())
///     .await;
///
/// if result.is_unavailable() {
///     println!("docker is not installed");
/// } else {
///     println!("stdout: {}", result.stdout);
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct DockerSandbox {
    binary: String,
    /// Set once a probe succeeds, cleared when the daemon drops away.
    reachable: AtomicBool,
}

impl Default for DockerSandbox {
    fn default() -> Self {
        Self::new()
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

impl DockerSandbox {
    /// Creates a sandbox using the `docker` binary on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    /// Creates a sandbox using a specific docker-compatible binary.
    #[must_use]
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            reachable: AtomicBool::new(false),
        }
    }

    /// Arguments for `docker run`, excluding the binary itself.
    #[must_use]
    pub fn run_args(
        profile: &LanguageProfile,
        config: &SandboxConfig,
        container_name: &str,
        run_id: &str,
        code_dir: &Path,
    ) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            format!("--name={container_name}"),
            format!("--label={SANDBOX_LABEL}=true"),
            format!("--label={SANDBOX_LABEL}.run={run_id}"),
        ];

        if config.network_disabled {
            args.push("--network=none".to_string());
        }
        if config.read_only {
            args.push("--read-only".to_string());
        }

        let exec = if profile.compiles { "exec" } else { "noexec" };
        args.push("--tmpfs".to_string());
        args.push(format!(
            "/tmp:rw,{exec},nosuid,size={}",
            config.tmp_size.bytes()
        ));

        let memory = config.memory_limit.bytes();
        args.extend([
            format!("--memory={memory}"),
            format!("--memory-swap={memory}"),
            format!("--cpus={}", config.cpu_limit),
            format!("--pids-limit={}", config.max_processes),
            format!("--ulimit=nproc={0}:{0}", config.max_processes),
            format!("--ulimit=nofile={0}:{0}", config.max_open_files),
            format!("--ulimit=fsize={0}:{0}", config.max_file_size.bytes()),
            "--cap-drop=ALL".to_string(),
            "--security-opt=no-new-privileges".to_string(),
            format!("--user={SANDBOX_USER}"),
            "--workdir=/tmp".to_string(),
            format!("--volume={}:{CODE_MOUNT}:ro", code_dir.display()),
            profile.image.to_string(),
            "sh".to_string(),
            "-c".to_string(),
            profile.command_for(&format!("{CODE_MOUNT}/{}", profile.file_name())),
        ]);

        args
    }

    async fn probe(&self) -> bool {
        let probe = Command::new(&self.binary)
            .args(["info", "--format", "{{.ServerVersion}}"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(PROBE_TIMEOUT, probe).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(err)) => {
                debug!(error = %err, binary = %self.binary, "Docker probe failed to start");
                false
            }
            Err(_) => {
                debug!(binary = %self.binary, "Docker probe timed out");
                false
            }
        }
    }

    async fn write_source(dir: &Path, profile: &LanguageProfile, code: &str) -> Result<()> {
        let file = dir.join(profile.file_name());
        tokio::fs::write(&file, code).await.map_err(|source| Error::Io {
            context: "writing sandbox source file".to_string(),
            source,
        })?;

        // The container user is unprivileged and must be able to read the mount.
        #[cfg(unix)]
        {
            use std::fs::Permissions;
            use std::os::unix::fs::PermissionsExt;

            for (path, mode) in [(dir, 0o755), (file.as_path(), 0o644)] {
                tokio::fs::set_permissions(path, Permissions::from_mode(mode))
                    .await
                    .map_err(|source| Error::Io {
                        context: "setting sandbox mount permissions".to_string(),
                        source,
                    })?;
            }
        }

        Ok(())
    }

    async fn terminate(&self, child: &mut Child, container_name: &str) {
        if let Err(err) = child.start_kill() {
            debug!(error = %err, "Docker client already exited");
        }

        remove_container(&self.binary, container_name).await;

        if let Err(err) = child.wait().await {
            debug!(error = %err, "Failed to reap docker client");
        }
    }

    async fn run(
        &self,
        code: &str,
        profile: &LanguageProfile,
        config: &SandboxConfig,
        cancel: &CancellationToken,
    ) -> Result<SandboxExecutionResult> {
        let code_dir = tempfile::Builder::new()
            .prefix("evolve-sandbox-")
            .tempdir()
            .map_err(|source| Error::Io {
                context: "creating sandbox directory".to_string(),
                source,
            })?;
        Self::write_source(code_dir.path(), profile, code).await?;

        let run_id = Uuid::new_v4().simple().to_string();
        let container_name = format!("{SANDBOX_LABEL}-{run_id}");
        let args = Self::run_args(profile, config, &container_name, &run_id, code_dir.path());
        debug!(container = %container_name, image = profile.image, "Starting sandbox container");

        let start = Instant::now();
        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Io {
                context: "spawning docker".to_string(),
                source,
            })?;
        let mut guard = ContainerGuard::new(&self.binary, &container_name);

        let limit = usize::try_from(config.max_output_size.bytes()).unwrap_or(usize::MAX);
        let stdout_task = child.stdout.take().map(|out| tokio::spawn(read_capped(out, limit)));
        let stderr_task = child.stderr.take().map(|err| tokio::spawn(read_capped(err, limit)));

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            () = tokio::time::sleep(config.timeout()) => Outcome::TimedOut,
            () = cancel.cancelled() => Outcome::Cancelled,
        };

        let status = match outcome {
            Outcome::Exited(Ok(status)) => {
                guard.disarm();
                status
            }
            // The guard stays armed and removes the container on return.
            Outcome::Exited(Err(source)) => {
                return Err(Error::Io {
                    context: "waiting for docker".to_string(),
                    source,
                });
            }
            interrupted => {
                self.terminate(&mut child, &container_name).await;
                guard.disarm();
                for task in [stdout_task, stderr_task].into_iter().flatten() {
                    task.abort();
                }
                let elapsed = elapsed_ms(start);
                let failure = if matches!(interrupted, Outcome::TimedOut) {
                    warn!(container = %container_name, timeout_secs = config.timeout_secs, "Sandbox execution timed out");
                    SandboxFailure::Timeout {
                        timeout_secs: config.timeout_secs,
                    }
                } else {
                    info!(container = %container_name, "Sandbox execution cancelled");
                    SandboxFailure::Cancelled
                };
                let mut result = SandboxExecutionResult::failed(failure, elapsed);
                result.resource_usage.memory_limit_bytes = config.memory_limit.bytes();
                return Ok(result);
            }
        };

        let elapsed = elapsed_ms(start);
        let (stdout, stdout_truncated) = collect(stdout_task).await;
        let (stderr, stderr_truncated) = collect(stderr_task).await;
        let exit_code = status.code();

        let failure = match exit_code {
            Some(0) => None,
            Some(DOCKER_RUN_FAILED) if daemon_unreachable(&stderr) => {
                self.reachable.store(false, Ordering::Release);
                warn!(container = %container_name, "Docker daemon became unreachable");
                Some(SandboxFailure::Unavailable {
                    reason: first_line(&stderr).unwrap_or("docker daemon unreachable").to_string(),
                })
            }
            Some(DOCKER_RUN_FAILED) => Some(SandboxFailure::Runtime {
                message: first_line(&stderr).unwrap_or("docker run failed").to_string(),
            }),
            Some(code) => Some(SandboxFailure::NonZeroExit { exit_code: code }),
            None => Some(SandboxFailure::Runtime {
                message: "docker client terminated by signal".to_string(),
            }),
        };

        info!(
            container = %container_name,
            exit_code = ?exit_code,
            elapsed_ms = elapsed,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "Sandbox execution completed"
        );

        Ok(SandboxExecutionResult {
            success: failure.is_none(),
            resource_usage: ResourceUsage {
                wall_time_ms: elapsed,
                stdout_bytes: stdout.len(),
                stderr_bytes: stderr.len(),
                output_truncated: stdout_truncated || stderr_truncated,
                memory_limit_bytes: config.memory_limit.bytes(),
            },
            stdout,
            stderr,
            exit_code,
            execution_time_ms: elapsed,
            failure,
        })
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    /// Probes the daemon until one probe succeeds; later calls reuse that
    /// answer until a run reports the daemon gone.
    async fn is_available(&self) -> bool {
        if self.reachable.load(Ordering::Acquire) {
            return true;
        }
        let reachable = self.probe().await;
        if reachable {
            self.reachable.store(true, Ordering::Release);
        }
        reachable
    }

    #[instrument(skip(self, code, config, cancel), fields(language = %language, code_len = code.len()))]
    async fn execute(
        &self,
        code: &str,
        language: Language,
        config: &SandboxConfig,
        cancel: &CancellationToken,
    ) -> SandboxExecutionResult {
        if !self.is_available().await {
            warn!("Docker sandbox not available");
            return SandboxExecutionResult::unavailable(format!(
                "'{} info' did not succeed",
                self.binary
            ));
        }

        let profile = LanguageProfile::for_language(language);
        match self.run(code, profile, config, cancel).await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "Sandbox execution failed");
                SandboxExecutionResult::failed(
                    SandboxFailure::Runtime {
                        message: err.to_string(),
                    },
                    0,
                )
            }
        }
    }

    async fn cleanup(&self) -> Result<usize> {
        if !self.is_available().await {
            return Ok(0);
        }

        let output = Command::new(&self.binary)
            .args(["ps", "-aq", "--filter", &format!("label={SANDBOX_LABEL}=true")])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| Error::Io {
                context: "listing sandbox containers".to_string(),
                source,
            })?;

        let ids: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let status = Command::new(&self.binary)
            .arg("rm")
            .arg("-f")
            .args(&ids)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|source| Error::Io {
                context: "removing sandbox containers".to_string(),
                source,
            })?;

        if !status.success() {
            return Err(Error::SandboxExecutionFailure {
                message: format!("failed to remove {} sandbox containers", ids.len()),
                exit_code: status.code(),
            });
        }

        info!(count = ids.len(), "Removed leftover sandbox containers");
        Ok(ids.len())
    }
}

/// Force-removes a started container when dropped, unless disarmed.
///
/// Covers every way [`DockerSandbox::run`] can stop early: an error
/// return, or the future being dropped by a caller-side timeout.
#[derive(Debug)]
struct ContainerGuard {
    binary: String,
    name: String,
    armed: bool,
}

impl ContainerGuard {
    fn new(binary: &str, name: &str) -> Self {
        Self {
            binary: binary.to_string(),
            name: name.to_string(),
            armed: true,
        }
    }

    const fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        debug!(container = %self.name, "Removing abandoned container");
        let binary = std::mem::take(&mut self.binary);
        let name = std::mem::take(&mut self.name);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { remove_container(&binary, &name).await });
            return;
        }

        let spawned = std::process::Command::new(&binary)
            .args(["rm", "-f", &name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(mut child) => {
                std::thread::spawn(move || child.wait());
            }
            Err(err) => warn!(container = %name, error = %err, "Container removal failed"),
        }
    }
}

async fn remove_container(binary: &str, name: &str) {
    let remove = Command::new(binary)
        .args(["rm", "-f", name])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();
    match tokio::time::timeout(REMOVE_TIMEOUT, remove).await {
        Ok(Ok(status)) if status.success() => debug!(container = %name, "Container removed"),
        Ok(Ok(status)) => warn!(container = %name, ?status, "Container removal reported failure"),
        Ok(Err(err)) => warn!(container = %name, error = %err, "Container removal failed"),
        Err(_) => warn!(container = %name, "Container removal timed out"),
    }
}

fn daemon_unreachable(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    DAEMON_UNREACHABLE.iter().any(|needle| stderr.contains(needle))
}

/// Reads a stream to the end, keeping at most `limit` bytes.
///
/// Bytes past the limit are drained and dropped so the writer never blocks.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> (Vec<u8>, bool) {
    let mut kept = Vec::new();
    let mut truncated = false;
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = limit.saturating_sub(kept.len());
                if n > room {
                    truncated = true;
                }
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
        }
    }
    (kept, truncated)
}

async fn collect(task: Option<tokio::task::JoinHandle<(Vec<u8>, bool)>>) -> (String, bool) {
    match task {
        Some(handle) => match handle.await {
            Ok((bytes, truncated)) => (String::from_utf8_lossy(&bytes).into_owned(), truncated),
            Err(err) => {
                debug!(error = %err, "Output reader task failed");
                (String::new(), false)
            }
        },
        None => (String::new(), false),
    }
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use evolve_core::MemoryLimit;
    use std::path::PathBuf;

    fn args_for(language: Language, config: &SandboxConfig) -> Vec<String> {
        DockerSandbox::run_args(
            LanguageProfile::for_language(language),
            config,
            "evolve-sandbox-abc",
            "abc",
            &PathBuf::from("/tmp/evolve-sandbox-xyz"),
        )
    }

    #[test]
    fn test_hardening_flags_present() {
        let args = args_for(Language::Python, &SandboxConfig::default());
        for flag in [
            "--rm",
            "--network=none",
            "--read-only",
            "--cap-drop=ALL",
            "--security-opt=no-new-privileges",
            "--user=65534:65534",
            "--pids-limit=32",
            "--ulimit=nproc=32:32",
            "--ulimit=nofile=64:64",
            "--ulimit=fsize=1048576:1048576",
            "--memory=134217728",
            "--cpus=0.5",
            "--label=evolve-sandbox=true",
            "--label=evolve-sandbox.run=abc",
        ] {
            assert!(args.iter().any(|a| a == flag), "missing {flag} in {args:?}");
        }
    }

    #[test]
    fn test_code_mounted_read_only_and_run() {
        let args = args_for(Language::Python, &SandboxConfig::default());
        assert!(args.contains(&"--volume=/tmp/evolve-sandbox-xyz:/code:ro".to_string()));
        let tail: Vec<&str> = args.iter().rev().take(4).rev().map(String::as_str).collect();
        assert_eq!(tail, ["python:3.11-alpine", "sh", "-c", "python3 /code/main.py"]);
    }

    #[test]
    fn test_tmpfs_exec_only_for_compiled_languages() {
        let config = SandboxConfig::default();
        let python = args_for(Language::Python, &config);
        assert!(python.contains(&"/tmp:rw,noexec,nosuid,size=10485760".to_string()));
        let c = args_for(Language::C, &config);
        assert!(c.contains(&"/tmp:rw,exec,nosuid,size=10485760".to_string()));
    }

    #[test]
    fn test_envelope_toggles() {
        let config = SandboxConfig {
            network_disabled: false,
            read_only: false,
            memory_limit: MemoryLimit::from_mb(256),
            ..SandboxConfig::default()
        };
        let args = args_for(Language::Bash, &config);
        assert!(!args.iter().any(|a| a == "--network=none"));
        assert!(!args.iter().any(|a| a == "--read-only"));
        assert!(args.contains(&"--memory-swap=268435456".to_string()));
    }

    #[tokio::test]
    async fn test_read_capped_truncates() {
        let data = vec![b'x'; 20_000];
        let (kept, truncated) = read_capped(&data[..], 100).await;
        assert_eq!(kept.len(), 100);
        assert!(truncated);

        let (kept, truncated) = read_capped(&b"hello"[..], 100).await;
        assert_eq!(kept, b"hello");
        assert!(!truncated);
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let sandbox = DockerSandbox::with_binary("evolve-definitely-not-docker");
        assert!(!sandbox.is_available().await);

        let result = sandbox
            .execute(
                "print('hi')",
                Language::Python,
                &SandboxConfig::default(),
                &CancellationToken::new(),
            )
            .await;
        assert!(result.is_unavailable());
        assert!(!result.success);
        assert_eq!(sandbox.cleanup().await.unwrap(), 0);
    }

    #[test]
    fn test_daemon_unreachable_detected() {
        assert!(daemon_unreachable(
            "docker: Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?"
        ));
        assert!(daemon_unreachable(
            "docker: error during connect: Post \"http://%2F%2F.%2Fpipe%2Fdocker_engine/v1.24/containers/create\""
        ));
        assert!(!daemon_unreachable(
            "docker: Error response from daemon: pull access denied for nosuchimage"
        ));
        assert!(!daemon_unreachable(""));
    }

    #[cfg(unix)]
    fn recording_binary(dir: &Path) -> (String, PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.join("calls.log");
        let script = dir.join("fake-docker");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$@\" >> '{}'\n", log.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (script.display().to_string(), log)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_armed_guard_removes_container() {
        let dir = tempfile::tempdir().unwrap();
        let (binary, log) = recording_binary(dir.path());

        drop(ContainerGuard::new(&binary, "evolve-sandbox-left"));

        let mut calls = String::new();
        for _ in 0..100 {
            calls = tokio::fs::read_to_string(&log).await.unwrap_or_default();
            if !calls.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(calls.trim(), "rm -f evolve-sandbox-left");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_disarmed_guard_leaves_container() {
        let dir = tempfile::tempdir().unwrap();
        let (binary, log) = recording_binary(dir.path());

        let mut guard = ContainerGuard::new(&binary, "evolve-sandbox-done");
        guard.disarm();
        drop(guard);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!log.exists());
    }

    #[tokio::test]
    async fn test_source_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let code = "print('unchanged')\n# trailing comment";
        let profile = LanguageProfile::for_language(Language::Python);
        DockerSandbox::write_source(dir.path(), profile, code).await.unwrap();
        let written = tokio::fs::read_to_string(dir.path().join("main.py")).await.unwrap();
        assert_eq!(written, code);
    }
}
