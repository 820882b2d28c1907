//! `connectivity`: bitcoind dials utreexod through `addnode`, and both
//! notice when bitcoind goes away.
//!
//! bitcoind lists inbound peers under an ephemeral port, so it has to be the
//! side that dials for its peer list to carry utreexod's listen address.

use peerlab_core::types::NodeVariant;
use peerlab_harness::{Harness, HarnessError, TestCase};
use peerlab_node::AddNodeCommand;
use tracing::info;

const UTREEXOD: usize = 0;
const BITCOIND: usize = 1;

#[derive(Debug, Default, Clone, Copy)]
pub struct Connectivity;

impl TestCase for Connectivity {
    fn name(&self) -> &str {
        "connectivity"
    }

    fn description(&self) -> &str {
        "bitcoind connects to utreexod and the link drops when bitcoind stops"
    }

    async fn set_test_params(&mut self, h: &mut Harness) -> Result<(), HarnessError> {
        h.add_node_default_args(NodeVariant::Utreexod).await?;
        h.add_node_default_args(NodeVariant::Bitcoind).await?;
        Ok(())
    }

    async fn run_test(&mut self, h: &mut Harness) -> Result<(), HarnessError> {
        h.run_node(UTREEXOD).await?;
        h.run_node(BITCOIND).await?;

        let utreexod_addr = h.get_node(UTREEXOD)?.p2p_url();
        h.get_node(BITCOIND)?
            .rpc()
            .add_node(&utreexod_addr, AddNodeCommand::Add, false)
            .await?;
        h.wait_for_peers_connections(UTREEXOD, BITCOIND, true)
            .await?;
        info!("utreexod and bitcoind connected");

        let peers = h.get_node(UTREEXOD)?.rpc().get_peer_info().await?;
        h.assert_equal(&peers.len(), &1usize).await?;

        let reply = h.stop_node(BITCOIND).await?;
        h.assert_is_some(&reply).await?;
        h.wait_for_peers_connections(UTREEXOD, BITCOIND, false)
            .await?;

        let peers = h.get_node(UTREEXOD)?.rpc().get_peer_info().await?;
        h.assert_equal(&peers.len(), &0usize).await
    }
}

#[cfg(test)]
mod tests {
    use peerlab_core::config::HarnessConfig;
    use peerlab_harness::run_with_backend;
    use peerlab_node::mock::MockNetwork;

    use super::*;

    fn config(temp: &tempfile::TempDir) -> HarnessConfig {
        let mut config = HarnessConfig::default();
        config.paths.temp_dir = temp.path().display().to_string();
        config
    }

    #[tokio::test]
    async fn test_connectivity_passes_against_mock() {
        // Given
        let temp = tempfile::tempdir().unwrap();
        let network = MockNetwork::new();

        // When
        let report = run_with_backend(&mut Connectivity, config(&temp), network.backend())
            .await
            .unwrap();

        // Then
        assert_eq!(report.nodes, 2);
        assert!(!network.is_running(UTREEXOD));
        assert!(!network.is_running(BITCOIND));
        assert!(network.calls(BITCOIND).iter().any(|c| c == "addnode"));
        assert!(!network.calls(UTREEXOD).iter().any(|c| c == "addnode"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connectivity_fails_when_link_never_appears() {
        // Given: links take more pings than the deadline allows
        let temp = tempfile::tempdir().unwrap();
        let network = MockNetwork::new();
        network.delay_links(1_000);

        // When
        let err = run_with_backend(&mut Connectivity, config(&temp), network.backend())
            .await
            .unwrap_err();

        // Then
        assert!(matches!(err, HarnessError::TestFailed { .. }), "{err}");
        assert!(err.to_string().contains("process with pids"), "{err}");
        assert!(!network.is_running(UTREEXOD));
        assert!(!network.is_running(BITCOIND));
    }
}
