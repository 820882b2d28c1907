//! `get-block`: florestad serves the same blocks as the bitcoind it synced
//! from, at verbosity 0 and 1.

use std::time::Duration;

use peerlab_core::types::NodeVariant;
use peerlab_harness::{Harness, HarnessError, TestCase};
use peerlab_node::AddNodeCommand;
use rand::Rng;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const FLORESTAD: usize = 0;
const BITCOIND: usize = 1;

/// Enough blocks to cross the first regtest difficulty period.
const FIRST_BATCH: u32 = 2017;
const SECOND_BATCH: u32 = 6;
const SYNC_DEADLINE: Duration = Duration::from_secs(20);
const SYNC_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Default, Clone, Copy)]
pub struct GetBlock;

fn round3(value: &Value) -> Option<f64> {
    value.as_f64().map(|v| (v * 1000.0).round() / 1000.0)
}

fn random_height(block_count: u64) -> u64 {
    rand::thread_rng().gen_range(1..=block_count.max(1))
}

impl GetBlock {
    async fn wait_for_sync(&self, h: &Harness, block_count: u64) -> Result<(), HarnessError> {
        let deadline = Instant::now() + SYNC_DEADLINE;
        while Instant::now() < deadline {
            let count = h.get_node(FLORESTAD)?.rpc().get_block_count().await?;
            if count == block_count {
                return Ok(());
            }
            debug!(count, block_count, "florestad still syncing");
            tokio::time::sleep(SYNC_POLL).await;
        }
        warn!(block_count, deadline = ?SYNC_DEADLINE, "florestad sync timed out");
        Err(HarnessError::Scenario(format!(
            "florestad did not sync to {block_count} within {SYNC_DEADLINE:?}"
        )))
    }

    async fn compare_block(&self, h: &mut Harness, height: u64) -> Result<(), HarnessError> {
        let hash = h.get_node(BITCOIND)?.rpc().get_blockhash(height).await?;
        info!(height, %hash, "comparing block between florestad and bitcoind");

        let floresta_block = h.get_node(FLORESTAD)?.rpc().get_block(&hash, 0).await?;
        let bitcoind_block = h.get_node(BITCOIND)?.rpc().get_block(&hash, 0).await?;
        h.assert_equal(&floresta_block, &bitcoind_block).await?;

        let floresta_block = h.get_node(FLORESTAD)?.rpc().get_block(&hash, 1).await?;
        let bitcoind_block = h.get_node(BITCOIND)?.rpc().get_block(&hash, 1).await?;
        let (Some(floresta_fields), Some(bitcoind_fields)) =
            (floresta_block.as_object(), bitcoind_block.as_object())
        else {
            return Err(HarnessError::Scenario(format!(
                "getblock {hash} with verbosity 1 did not return objects"
            )));
        };

        let floresta_keys: Vec<&String> = floresta_fields.keys().collect();
        for (key, bval) in bitcoind_fields {
            h.assert_in(&key, &floresta_keys).await?;
            let fval = &floresta_fields[key];
            debug!(%key, floresta = %fval, bitcoind = %bval, "comparing field");
            if key == "difficulty" {
                h.assert_equal(&round3(fval), &round3(bval)).await?;
            } else {
                h.assert_equal(fval, bval).await?;
            }
        }
        Ok(())
    }
}

impl TestCase for GetBlock {
    fn name(&self) -> &str {
        "get-block"
    }

    fn description(&self) -> &str {
        "florestad getblock matches bitcoind for genesis, a random block and the tip"
    }

    async fn set_test_params(&mut self, h: &mut Harness) -> Result<(), HarnessError> {
        let dirs = h.create_data_dirs("get_block", 2)?;
        h.add_node_extra_args(
            NodeVariant::Florestad,
            vec![format!("--data-dir={}", dirs[0].display())],
        )
        .await?;
        h.add_node_extra_args(
            NodeVariant::Bitcoind,
            vec![
                format!("-datadir={}", dirs[1].display()),
                "-v2transport=1".to_owned(),
            ],
        )
        .await?;
        Ok(())
    }

    async fn run_test(&mut self, h: &mut Harness) -> Result<(), HarnessError> {
        h.run_node(FLORESTAD).await?;
        h.run_node(BITCOIND).await?;

        h.get_node(BITCOIND)?.rpc().generate_block(FIRST_BATCH).await?;
        tokio::time::sleep(Duration::from_secs(1)).await;
        h.get_node(BITCOIND)?.rpc().generate_block(SECOND_BATCH).await?;

        info!("connecting florestad to bitcoind");
        let bitcoind_addr = h.get_node(BITCOIND)?.p2p_url();
        h.get_node(FLORESTAD)?
            .rpc()
            .add_node(&bitcoind_addr, AddNodeCommand::Add, true)
            .await?;

        let block_count = h.get_node(BITCOIND)?.rpc().get_block_count().await?;
        self.wait_for_sync(h, block_count).await?;

        let floresta_count = h.get_node(FLORESTAD)?.rpc().get_block_count().await?;
        let bitcoind_count = h.get_node(BITCOIND)?.rpc().get_block_count().await?;
        h.assert_equal(&floresta_count, &bitcoind_count).await?;

        self.compare_block(h, 0).await?;
        self.compare_block(h, random_height(block_count)).await?;
        self.compare_block(h, block_count).await
    }
}

#[cfg(test)]
mod tests {
    use peerlab_core::config::HarnessConfig;
    use peerlab_harness::run_with_backend;
    use peerlab_node::mock::MockNetwork;
    use serde_json::json;

    use super::*;

    #[test]
    fn difficulty_is_compared_to_three_decimals() {
        assert_eq!(round3(&json!(4.656542373906925e-10)), Some(0.0));
        assert_eq!(round3(&json!(1.23449)), round3(&json!(1.2345)));
        assert_ne!(round3(&json!(1.2344)), round3(&json!(1.2356)));
        assert_eq!(round3(&json!("1.0")), None);
    }

    #[test]
    fn random_height_stays_in_range() {
        for _ in 0..100 {
            let h = random_height(2023);
            assert!((1..=2023).contains(&h), "{h}");
        }
        assert_eq!(random_height(0), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_block_passes_against_mock() {
        // Given
        let temp = tempfile::tempdir().unwrap();
        let network = MockNetwork::new();
        let mut config = HarnessConfig::default();
        config.paths.temp_dir = temp.path().display().to_string();

        // When
        let report = run_with_backend(&mut GetBlock, config, network.backend())
            .await
            .unwrap();

        // Then
        assert_eq!(report.nodes, 2);
        let getblocks = network
            .calls(FLORESTAD)
            .iter()
            .filter(|c| *c == "getblock")
            .count();
        assert_eq!(getblocks, 6, "three heights at two verbosities");
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_block_fails_when_florestad_never_syncs() {
        // Given: the addnode link never forms, so florestad stays at genesis
        let temp = tempfile::tempdir().unwrap();
        let network = MockNetwork::new();
        network.delay_links(1_000_000);
        let mut config = HarnessConfig::default();
        config.paths.temp_dir = temp.path().display().to_string();

        // When
        let err = run_with_backend(&mut GetBlock, config, network.backend())
            .await
            .unwrap_err();

        // Then
        match err.root() {
            HarnessError::Scenario(msg) => assert!(msg.contains("did not sync to 2023"), "{msg}"),
            other => panic!("expected Scenario, got {other}"),
        }
        assert!(!network.calls(FLORESTAD).iter().any(|c| c == "getblock"));
    }
}
