//! disconnectnode: rejected addresses keep the link, the right one drops it.
//!
//! Runs as a full test case through `run_with_backend`, so a failure here
//! also exercises the teardown path.

use peerlab_core::types::{EndpointKind, NodeVariant};
use peerlab_harness::{Harness, HarnessError, TestCase, run_with_backend};
use peerlab_node::mock::MockNetwork;
use peerlab_node::{AddNodeCommand, RpcError};
use serde_json::Value;

use crate::helpers::config::TestConfigBuilder;

const BITCOIND: usize = 0;
const FLORESTAD: usize = 1;

struct DisconnectNode;

fn is_http(e: &HarnessError) -> bool {
    matches!(e, HarnessError::Rpc(RpcError::Http { .. }))
}

impl DisconnectNode {
    async fn expect_peers(&self, h: &mut Harness, connected: bool) -> Result<(), HarnessError> {
        h.wait_for_peers_connections(BITCOIND, FLORESTAD, connected)
            .await?;
        let expected = usize::from(connected);
        let peers = h.get_node(FLORESTAD)?.rpc().get_peer_info().await?;
        h.assert_equal(&peers.len(), &expected).await?;
        let peers = h.get_node(BITCOIND)?.rpc().get_peer_info().await?;
        h.assert_equal(&peers.len(), &expected).await
    }

    async fn rejected(&self, h: &mut Harness, address: &str, id: Option<u64>) -> Result<(), HarnessError> {
        let result = h
            .get_node(FLORESTAD)?
            .rpc()
            .disconnect_node(address, id)
            .await;
        h.assert_raises("HTTP error", is_http, result).await?;
        self.expect_peers(h, true).await
    }
}

impl TestCase for DisconnectNode {
    fn name(&self) -> &str {
        "DisconnectNodeTest"
    }

    async fn set_test_params(&mut self, h: &mut Harness) -> Result<(), HarnessError> {
        h.add_node_default_args(NodeVariant::Bitcoind).await?;
        h.add_node_default_args(NodeVariant::Florestad).await?;
        Ok(())
    }

    async fn run_test(&mut self, h: &mut Harness) -> Result<(), HarnessError> {
        h.run_node(BITCOIND).await?;
        h.run_node(FLORESTAD).await?;

        let port = h.get_node(BITCOIND)?.port(EndpointKind::P2p);
        let bitcoind_addr = format!("127.0.0.1:{port}");
        let res = h
            .get_node(FLORESTAD)?
            .rpc()
            .add_node(&bitcoind_addr, AddNodeCommand::Add, false)
            .await?;
        h.assert_equal(&res, &Value::Null).await?;
        self.expect_peers(h, true).await?;

        // the only peer has id 0
        self.rejected(h, "", Some(1)).await?;
        self.rejected(h, &format!("127.0.0.1:{}", port + 1), None).await?;
        self.rejected(h, &format!("127.0.0.2:{port}"), None).await?;
        self.rejected(h, &format!("127.0.0:{port}"), None).await?;

        h.get_node(FLORESTAD)?
            .rpc()
            .disconnect_node(&bitcoind_addr, None)
            .await?;
        self.expect_peers(h, false).await?;

        h.get_node(FLORESTAD)?
            .rpc()
            .add_node(&bitcoind_addr, AddNodeCommand::Add, false)
            .await?;
        self.expect_peers(h, true).await?;

        let peers = h.get_node(FLORESTAD)?.rpc().get_peer_info().await?;
        let id = peers[0]["id"].as_u64();
        h.assert_is_some(&id).await?;
        h.get_node(FLORESTAD)?
            .rpc()
            .disconnect_node("", id)
            .await?;
        self.expect_peers(h, false).await
    }
}

#[tokio::test]
async fn test_e2e_disconnect_node_flow() {
    // Given
    let temp = tempfile::tempdir().unwrap();
    let network = MockNetwork::new();
    let config = TestConfigBuilder::new(temp.path()).build();

    // When
    let report = run_with_backend(&mut DisconnectNode, config, network.backend())
        .await
        .unwrap();

    // Then
    assert_eq!(report.nodes, 2);
    assert!(!network.is_running(BITCOIND));
    assert!(!network.is_running(FLORESTAD));
    let calls = network.calls(FLORESTAD);
    assert_eq!(
        calls.iter().filter(|c| *c == "disconnectnode").count(),
        6,
        "four rejected, two accepted"
    );
}
