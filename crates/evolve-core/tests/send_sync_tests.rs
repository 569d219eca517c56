//! Tests to verify that shared public types are Send + Sync.

use evolve_core::*;

const fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_domain_types_are_send_sync() {
    assert_send_sync::<Language>();
    assert_send_sync::<LayerName>();
    assert_send_sync::<MemoryLimit>();
    assert_send_sync::<SecurityScore>();
}

#[test]
fn test_result_types_are_send_sync() {
    // Results cross task boundaries in the CLI
    assert_send_sync::<LayerResult>();
    assert_send_sync::<ValidationResult>();
    assert_send_sync::<SandboxExecutionResult>();
}

#[test]
fn test_config_types_are_send_sync() {
    assert_send_sync::<EvolveConfig>();
    assert_send_sync::<SandboxConfig>();
    assert_send_sync::<ProviderConfig>();
}

#[test]
fn test_error_is_send_sync() {
    assert_send_sync::<Error>();
}
