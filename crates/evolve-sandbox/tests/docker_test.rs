//! Integration tests against a real docker daemon.
//!
//! These need docker and network access to pull images, so they are
//! ignored by default. Run with `cargo test -p evolve-sandbox -- --ignored`.

use evolve_core::{Language, SandboxConfig, SandboxFailure};
use evolve_sandbox::{DockerSandbox, Sandbox};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn quick_config() -> SandboxConfig {
    SandboxConfig::builder()
        .memory_limit_mb(64)
        .timeout(Duration::from_secs(20))
        .build()
}

/// Tests a plain python run end to end
#[tokio::test]
#[ignore = "requires docker"]
async fn test_python_hello() {
    let sandbox = DockerSandbox::new();
    let result = sandbox
        .execute("print('hi')", Language::Python, &quick_config(), &CancellationToken::new())
        .await;

    assert!(result.success, "{:?}", result.failure);
    assert_eq!(result.stdout.trim(), "hi");
    assert_eq!(result.exit_code, Some(0));
}

/// Tests that the network is unreachable from inside the container
#[tokio::test]
#[ignore = "requires docker"]
async fn test_network_disabled() {
    let code = "import socket\nsocket.create_connection(('1.1.1.1', 53), timeout=2)\n";
    let result = DockerSandbox::new()
        .execute(code, Language::Python, &quick_config(), &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert!(matches!(result.failure, Some(SandboxFailure::NonZeroExit { .. })));
}

/// Tests that a non-terminating program is killed at the timeout
#[tokio::test]
#[ignore = "requires docker"]
async fn test_infinite_loop_times_out() {
    let config = SandboxConfig::builder()
        .timeout(Duration::from_secs(3))
        .build();
    let result = DockerSandbox::new()
        .execute("while True:\n    pass\n", Language::Python, &config, &CancellationToken::new())
        .await;

    assert!(result.is_timeout());
    assert!(result.execution_time_ms < 15_000);
}

/// Tests that cancellation ends the run early
#[tokio::test]
#[ignore = "requires docker"]
async fn test_cancellation() {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        cancel.cancel();
    });

    let result = DockerSandbox::new()
        .execute("import time\ntime.sleep(60)\n", Language::Python, &quick_config(), &token)
        .await;

    assert_eq!(result.failure, Some(SandboxFailure::Cancelled));
}

/// Tests that cleanup succeeds against a live daemon
#[tokio::test]
#[ignore = "requires docker"]
async fn test_cleanup_succeeds() {
    let sandbox = DockerSandbox::new();
    assert!(sandbox.is_available().await);
    assert!(sandbox.cleanup().await.is_ok());
}
