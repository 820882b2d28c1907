//! `disconnect-node`: florestad drops a bitcoind peer only when the
//! `disconnectnode` target actually names it.

use std::time::Duration;

use peerlab_core::types::{EndpointKind, NodeVariant};
use peerlab_harness::{Harness, HarnessError, TestCase};
use peerlab_node::{AddNodeCommand, NodeError, RpcError};
use serde_json::Value;
use tracing::{info, warn};

const BITCOIND: usize = 0;
const FLORESTAD: usize = 1;

/// Connection waits tried after re-adding the peer.
const RECONNECT_ATTEMPTS: u32 = 20;
const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Default, Clone, Copy)]
pub struct DisconnectNode;

fn is_http(e: &HarnessError) -> bool {
    matches!(e, HarnessError::Rpc(RpcError::Http { .. }))
}

impl DisconnectNode {
    fn bitcoind_address(h: &Harness) -> Result<String, HarnessError> {
        let port = h.get_node(BITCOIND)?.port(EndpointKind::P2p);
        Ok(format!("127.0.0.1:{port}"))
    }

    async fn add_bitcoind(&self, h: &mut Harness) -> Result<(), HarnessError> {
        let address = Self::bitcoind_address(h)?;
        let res = h
            .get_node(FLORESTAD)?
            .rpc()
            .add_node(&address, AddNodeCommand::Add, false)
            .await?;
        h.assert_equal(&res, &Value::Null).await
    }

    /// Both sides report exactly one peer when connected, none otherwise.
    async fn expect_peers(&self, h: &mut Harness, connected: bool) -> Result<(), HarnessError> {
        h.wait_for_peers_connections(BITCOIND, FLORESTAD, connected)
            .await?;
        self.count_peers(h, connected).await
    }

    async fn count_peers(&self, h: &mut Harness, connected: bool) -> Result<(), HarnessError> {
        let expected = usize::from(connected);
        let peers = h.get_node(FLORESTAD)?.rpc().get_peer_info().await?;
        h.assert_equal(&peers.len(), &expected).await?;
        let peers = h.get_node(BITCOIND)?.rpc().get_peer_info().await?;
        h.assert_equal(&peers.len(), &expected).await
    }

    async fn reconnect(&self, h: &mut Harness) -> Result<(), HarnessError> {
        self.add_bitcoind(h).await?;
        for attempt in 1..=RECONNECT_ATTEMPTS {
            match h.wait_for_peers_connections(BITCOIND, FLORESTAD, true).await {
                Ok(()) => return self.count_peers(h, true).await,
                Err(HarnessError::Node(NodeError::ConnectionTimeout { .. }))
                    if attempt < RECONNECT_ATTEMPTS =>
                {
                    warn!(attempt, "peers not reconnected yet");
                    tokio::time::sleep(RECONNECT_PAUSE).await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(HarnessError::Scenario(format!(
            "failed to reconnect after {RECONNECT_ATTEMPTS} attempts"
        )))
    }

    /// A `disconnectnode` that must be refused with an HTTP error and leave
    /// the link up.
    async fn rejected(&self, h: &mut Harness, address: &str, id: Option<u64>) -> Result<(), HarnessError> {
        info!(address, ?id, "disconnecting with a target that does not match");
        let result = h
            .get_node(FLORESTAD)?
            .rpc()
            .disconnect_node(address, id)
            .await;
        h.assert_raises("HTTP error", is_http, result).await?;
        self.expect_peers(h, true).await
    }

    async fn accepted(&self, h: &mut Harness, address: &str, id: Option<u64>) -> Result<(), HarnessError> {
        info!(address, ?id, "disconnecting the connected peer");
        let res = h
            .get_node(FLORESTAD)?
            .rpc()
            .disconnect_node(address, id)
            .await?;
        h.assert_equal(&res, &Value::Null).await?;
        self.expect_peers(h, false).await
    }
}

impl TestCase for DisconnectNode {
    fn name(&self) -> &str {
        "disconnect-node"
    }

    fn description(&self) -> &str {
        "florestad disconnectnode accepts only the address or id of a connected peer"
    }

    async fn set_test_params(&mut self, h: &mut Harness) -> Result<(), HarnessError> {
        let dirs = h.create_data_dirs("disconnect_node", 2)?;
        h.add_node_extra_args(
            NodeVariant::Bitcoind,
            vec![format!("-datadir={}", dirs[0].display())],
        )
        .await?;
        h.add_node_extra_args(
            NodeVariant::Florestad,
            vec![format!("--data-dir={}", dirs[1].display())],
        )
        .await?;
        Ok(())
    }

    async fn run_test(&mut self, h: &mut Harness) -> Result<(), HarnessError> {
        h.run_node(BITCOIND).await?;
        h.run_node(FLORESTAD).await?;

        self.add_bitcoind(h).await?;
        self.expect_peers(h, true).await?;

        let address = Self::bitcoind_address(h)?;
        let port = h.get_node(BITCOIND)?.port(EndpointKind::P2p);

        // the only peer has id 0
        self.rejected(h, "", Some(1)).await?;
        self.rejected(h, &format!("127.0.0.1:{}", port.wrapping_add(1)), None)
            .await?;
        self.rejected(h, &format!("127.0.0.2:{port}"), None).await?;
        self.rejected(h, &format!("127.0.0:{port}"), None).await?;

        self.accepted(h, &address, None).await?;
        self.reconnect(h).await?;

        let peers = h.get_node(FLORESTAD)?.rpc().get_peer_info().await?;
        let id = peers.first().and_then(|p| p["id"].as_u64());
        h.assert_is_some(&id).await?;
        self.accepted(h, "", id).await
    }
}
