//! Failing cases: assertion teardown and forced cleanup by signal.

use peerlab_core::types::NodeVariant;
use peerlab_harness::{Harness, HarnessError, TestCase, run_with_backend};
use peerlab_node::Signal;
use peerlab_node::mock::MockNetwork;

use crate::helpers::config::TestConfigBuilder;

/// Starts three nodes, then fails the way `failure` says.
struct Failing {
    failure: Failure,
}

enum Failure {
    Assertion,
    Scenario,
}

impl TestCase for Failing {
    fn name(&self) -> &str {
        "Failing"
    }

    fn description(&self) -> &str {
        "starts three nodes and fails"
    }

    async fn set_test_params(&mut self, h: &mut Harness) -> Result<(), HarnessError> {
        h.add_node_default_args(NodeVariant::Florestad).await?;
        h.add_node_default_args(NodeVariant::Utreexod).await?;
        h.add_node_default_args(NodeVariant::Bitcoind).await?;
        Ok(())
    }

    async fn run_test(&mut self, h: &mut Harness) -> Result<(), HarnessError> {
        for i in 0..h.node_count() {
            h.run_node(i).await?;
        }
        match self.failure {
            Failure::Assertion => {
                let count = h.get_node(0)?.rpc().get_block_count().await?;
                h.assert_equal(&count, &1u64).await
            }
            Failure::Scenario => Err(HarnessError::Scenario("peer never synced".to_owned())),
        }
    }
}

/// An assertion failure stops every node and names all pids.
#[tokio::test]
async fn test_e2e_assertion_failure_tears_down_everything() {
    // Given
    let temp = tempfile::tempdir().unwrap();
    let network = MockNetwork::new();
    let mut case = Failing {
        failure: Failure::Assertion,
    };

    // When
    let err = run_with_backend(&mut case, TestConfigBuilder::new(temp.path()).build(), network.backend())
        .await
        .unwrap_err();

    // Then
    let msg = err.to_string();
    assert!(msg.starts_with("process with pids [4000, 4001, 4002] failed"), "{msg}");
    assert!(msg.contains("Actual: 0\nExpected: 1"), "{msg}");
    assert!(matches!(err.root(), HarnessError::AssertionFailed(_)));
    for i in 0..3 {
        assert!(!network.is_running(i), "node {i} should be stopped");
        assert!(network.signals(i).is_empty(), "graceful stop was enough for node {i}");
    }
}

/// Nodes that refuse rpc stop and ignore SIGTERM still end up killed.
#[tokio::test]
async fn test_e2e_stubborn_nodes_are_killed() {
    let temp = tempfile::tempdir().unwrap();
    let network = MockNetwork::new();
    let mut case = Failing {
        failure: Failure::Scenario,
    };
    // failures can only be injected once set_test_params has bound the nodes
    let config = TestConfigBuilder::new(temp.path()).build();
    let mut harness = Harness::with_backend("Stubborn", config, network.backend()).unwrap();
    TestCase::set_test_params(&mut case, &mut harness).await.unwrap();
    network.fail_rpc_stop(2);
    network.ignore_sigterm(2);

    let err = TestCase::run_test(&mut case, &mut harness).await.unwrap_err();
    let pids = harness.teardown().await;

    assert!(matches!(err, HarnessError::Scenario(_)));
    assert_eq!(pids.len(), 3);
    assert!(!network.is_running(2));
    assert_eq!(network.signals(2), vec![Signal::Term, Signal::Kill]);
}
