//! Integration tests running the `evolve` binary.
//!
//! Every test passes an explicit configuration that keeps providers and
//! Docker out of the picture, so nothing here needs the network.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const OFFLINE_CONFIG: &str = "\
[validation]
llm_validation = false
sandbox_execution = false
";

fn evolve(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_evolve"))
        .args(args)
        .env_remove("EVOLVE_CONFIG")
        .env_remove("EVOLVE_LOG_FILE")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run evolve")
}

fn write(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path_str(&path)
}

fn path_str(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

/// Tests that help lists every subcommand
#[test]
fn test_help_lists_commands() {
    let output = evolve(&["--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["validate", "generate", "providers"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

/// Tests that a missing source file is an error
#[test]
fn test_validate_missing_file() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "config.toml", OFFLINE_CONFIG);
    let missing = path_str(&dir.path().join("missing.py"));

    let output = evolve(&["--config", &config, "validate", &missing]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read"));
}

/// Tests that a broken configuration file stops every command
#[test]
fn test_invalid_config_rejected() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "config.toml", "[validation]\nmin_security_score = 500\n");

    let output = evolve(&["--config", &config, "providers"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid config file"));
}

/// Tests a JSON report and the rejection exit status
#[test]
fn test_validate_json_report() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "config.toml", OFFLINE_CONFIG);
    let script = write(&dir, "script.py", "import os\nprint(os.getcwd())\n");

    let output = evolve(&["--config", &config, "--format", "json", "validate", &script]);
    assert_eq!(output.status.code(), Some(3));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["is_valid"], false);
    assert_eq!(report["security_score"], 75);

    let issues: Vec<&str> = report["issues"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|issue| issue.as_str())
        .collect();
    assert!(issues.contains(&"Import not in allowed list: os"));
    assert!(issues.contains(&"Critical layer 'llm_validation' was not applicable"));
    assert_eq!(report["layer_results"]["sandbox_execution"]["state"], "not_applicable");
}

/// Tests reading code from standard input
#[test]
fn test_validate_from_stdin() {
    use std::io::Write;
    use std::process::Stdio;

    let dir = TempDir::new().unwrap();
    let config = write(&dir, "config.toml", OFFLINE_CONFIG);

    let mut child = Command::new(env!("CARGO_BIN_EXE_evolve"))
        .args(["--config", &config, "--format", "json", "validate", "-"])
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"print('hi')\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["security_score"], 100);
    assert_eq!(report["layer_results"]["static_scan"]["state"], "pass");
}
