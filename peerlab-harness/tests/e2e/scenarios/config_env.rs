//! PEERLAB_TEMP_DIR -> HarnessConfig::from_env -> node directories.

use peerlab_core::config::{HarnessConfig, TEMP_DIR_ENV};
use peerlab_core::error::ConfigError;
use peerlab_core::types::NodeVariant;
use peerlab_harness::{Harness, HarnessError};
use peerlab_node::mock::MockNetwork;

fn set_env(key: &str, value: Option<&str>) -> Option<String> {
    let original = std::env::var(key).ok();
    // SAFETY: env-touching tests are serialized with serial_test.
    unsafe {
        match value {
            Some(v) => std::env::set_var(key, v),
            None => std::env::remove_var(key),
        }
    }
    original
}

fn restore_env(key: &str, original: Option<String>) {
    // SAFETY: test cleanup, still serialized.
    unsafe {
        match original {
            Some(v) => std::env::set_var(key, v),
            None => std::env::remove_var(key),
        }
    }
}

/// Everything a case writes lands under PEERLAB_TEMP_DIR.
#[tokio::test]
#[serial_test::serial]
async fn test_e2e_temp_dir_from_env_roots_node_data() {
    // Given
    let temp = tempfile::tempdir().unwrap();
    let original = set_env(TEMP_DIR_ENV, Some(temp.path().to_str().unwrap()));

    // When
    let config = HarnessConfig::from_env();
    restore_env(TEMP_DIR_ENV, original);
    let network = MockNetwork::new();
    let mut h = Harness::with_backend("EnvRooted", config.unwrap(), network.backend()).unwrap();
    let idx = h.add_node_with_tls(NodeVariant::Florestad).await.unwrap();

    // Then
    let node = h.get_node(idx).unwrap();
    assert!(node.data_dir().starts_with(temp.path()));
    assert!(node.data_dir().ends_with("data/envrooted/florestad0"));
    let tls = node.endpoints().electrum.tls.as_ref().unwrap();
    assert!(tls.cert_file.starts_with(temp.path().join("data").join("tls")));
    assert_eq!(
        h.config().binaries_dir(),
        temp.path().join("binaries"),
        "binaries default to {{temp}}/binaries"
    );
}

/// Without PEERLAB_TEMP_DIR nothing is started.
#[test]
#[serial_test::serial]
fn test_e2e_missing_temp_dir_is_fatal() {
    let original = set_env(TEMP_DIR_ENV, None);
    let original_paths = set_env("PEERLAB_PATHS_TEMP_DIR", None);

    let result = HarnessConfig::from_env();

    restore_env(TEMP_DIR_ENV, original);
    restore_env("PEERLAB_PATHS_TEMP_DIR", original_paths);
    let err = result.unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnv { ref var } if var == TEMP_DIR_ENV));
    let err: HarnessError = err.into();
    assert!(err.to_string().contains(TEMP_DIR_ENV));
}
