//! Node registration -> retrying startup -> locked configuration.

use crate::helpers::config::TestConfigBuilder;
use crate::helpers::harness::mock_harness;

use peerlab_core::types::{EndpointKind, NodeVariant};
use peerlab_harness::HarnessError;
use peerlab_node::NodeError;

/// Two transient start failures are absorbed, each retry on fresh ports.
#[tokio::test]
async fn test_e2e_run_node_survives_port_races() {
    // Given
    let temp = tempfile::tempdir().unwrap();
    let (mut harness, network) = mock_harness("PortRace", TestConfigBuilder::new(temp.path()).build());
    let idx = harness
        .add_node_default_args(NodeVariant::Bitcoind)
        .await
        .unwrap();
    network.fail_next_starts(idx, 2);

    // When
    harness.run_node(idx).await.unwrap();

    // Then
    let ports = network.attempted_rpc_ports(idx);
    assert_eq!(ports.len(), 3, "two failures then success");
    assert_ne!(ports[0], ports[2], "retries must use regenerated ports");
    let node = harness.get_node_mut(idx).unwrap();
    assert_eq!(node.port(EndpointKind::Rpc), ports[2]);
    assert!(node.is_locked());
    assert!(node.is_running());
}

/// Exhausted attempts surface StartupFailed with the variant and attempt count.
#[tokio::test]
async fn test_e2e_run_node_gives_up_after_configured_attempts() {
    let temp = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(temp.path()).start_attempts(2).build();
    let (mut harness, network) = mock_harness("GiveUp", config);
    let idx = harness
        .add_node_default_args(NodeVariant::Utreexod)
        .await
        .unwrap();
    network.fail_next_starts(idx, 5);

    let err = harness.run_node(idx).await.unwrap_err();

    match err {
        HarnessError::Node(NodeError::StartupFailed {
            variant, attempts, ..
        }) => {
            assert_eq!(variant, NodeVariant::Utreexod);
            assert_eq!(attempts, 2);
        }
        other => panic!("expected StartupFailed, got {other}"),
    }
    assert_eq!(network.attempted_rpc_ports(idx).len(), 2);
}

/// A mutable node picks up new arguments on its next start; afterwards it is locked.
#[tokio::test]
async fn test_e2e_setters_apply_before_first_start_only() {
    let temp = tempfile::tempdir().unwrap();
    let (mut harness, network) = mock_harness("Setters", TestConfigBuilder::new(temp.path()).build());
    let idx = harness
        .add_node_default_args(NodeVariant::Florestad)
        .await
        .unwrap();

    harness
        .get_node_mut(idx)
        .unwrap()
        .set_extra_args(vec!["--debug".to_owned()])
        .unwrap();
    harness.run_node(idx).await.unwrap();

    assert_eq!(network.extra_args(idx), vec!["--debug".to_owned()]);
    let err = harness
        .get_node_mut(idx)
        .unwrap()
        .set_extra_args(vec![])
        .unwrap_err();
    assert!(matches!(err, NodeError::ConfigLocked { field: "extra args", .. }));
}

/// Starting a running node is rejected; stopping returns the rpc reply.
#[tokio::test]
async fn test_e2e_start_twice_and_stop_reply() {
    let temp = tempfile::tempdir().unwrap();
    let (mut harness, network) = mock_harness("StartTwice", TestConfigBuilder::new(temp.path()).build());
    let idx = harness
        .add_node_default_args(NodeVariant::Bitcoind)
        .await
        .unwrap();
    harness.run_node(idx).await.unwrap();

    let err = harness.get_node_mut(idx).unwrap().start().await.unwrap_err();
    assert!(matches!(err, NodeError::AlreadyRunning { .. }));

    let reply = harness.stop_node(idx).await.unwrap();
    assert_eq!(reply, Some(serde_json::json!("Satoshi stopping")));
    assert!(!network.is_running(idx));

    // stopping again is a no-op
    assert_eq!(harness.stop_node(idx).await.unwrap(), None);
}

/// Data directories created for explicit per-node `--data-dir` arguments.
#[tokio::test]
async fn test_e2e_create_data_dirs() {
    let temp = tempfile::tempdir().unwrap();
    let (harness, _network) = mock_harness("Dirs", TestConfigBuilder::new(temp.path()).build());

    let dirs = harness.create_data_dirs("disconnectnodetest", 2).unwrap();

    assert_eq!(dirs.len(), 2);
    assert!(dirs[0].ends_with("data/disconnectnodetest/node-0"));
    assert!(dirs.iter().all(|d| d.is_dir()));
}
