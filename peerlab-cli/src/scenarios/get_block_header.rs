//! `get-block-header`: a fresh florestad reports the regtest genesis header.

use peerlab_core::types::NodeVariant;
use peerlab_harness::{Harness, HarnessError, TestCase};
use serde_json::{Value, json};

const FLORESTAD: usize = 0;

const GENESIS_HASH: &str = "0f9188f13cb7b2c71f2a335e3a4fc328bf5beb436012afca590b1a11466e2206";
const GENESIS_PREV_BLOCKHASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";
const GENESIS_MERKLE_ROOT: &str =
    "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";
const GENESIS_TIME: u64 = 1_296_688_602;
const GENESIS_BITS: u64 = 545_259_519;
const GENESIS_NONCE: u64 = 2;

#[derive(Debug, Default, Clone, Copy)]
pub struct GetBlockHeader;

impl TestCase for GetBlockHeader {
    fn name(&self) -> &str {
        "get-block-header"
    }

    fn description(&self) -> &str {
        "florestad getblockheader returns the regtest genesis header"
    }

    async fn set_test_params(&mut self, h: &mut Harness) -> Result<(), HarnessError> {
        h.add_node_default_args(NodeVariant::Florestad).await?;
        Ok(())
    }

    async fn run_test(&mut self, h: &mut Harness) -> Result<(), HarnessError> {
        h.run_node(FLORESTAD).await?;

        let hash = h.get_node(FLORESTAD)?.rpc().get_blockhash(0).await?;
        h.assert_equal(hash.as_str(), GENESIS_HASH).await?;

        let header = h.get_node(FLORESTAD)?.rpc().get_blockheader(&hash).await?;
        let expected: [(&str, Value); 6] = [
            ("version", json!(1)),
            ("prev_blockhash", json!(GENESIS_PREV_BLOCKHASH)),
            ("merkle_root", json!(GENESIS_MERKLE_ROOT)),
            ("time", json!(GENESIS_TIME)),
            ("bits", json!(GENESIS_BITS)),
            ("nonce", json!(GENESIS_NONCE)),
        ];
        for (field, value) in &expected {
            h.assert_equal(&header[*field], value).await?;
        }
        Ok(())
    }
}
