//! bitcoind client.

use peerlab_core::endpoint::RpcConfig;
use peerlab_core::types::NodeVariant;
use serde_json::{Value, json};

use super::{AddNodeCommand, JsonRpcTransport, RpcClient};
use crate::daemon::BoxFuture;
use crate::error::RpcError;

/// Regtest address that receives mined coinbase outputs.
pub const REGTEST_MINING_ADDRESS: &str =
    "bcrt1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq3xueyj";

pub struct BitcoinRpc {
    transport: JsonRpcTransport,
}

impl BitcoinRpc {
    pub fn new(transport: JsonRpcTransport) -> Self {
        Self { transport }
    }
}

impl RpcClient for BitcoinRpc {
    fn variant(&self) -> NodeVariant {
        NodeVariant::Bitcoind
    }

    fn config(&self) -> &RpcConfig {
        self.transport.config()
    }

    fn set_config(&mut self, config: RpcConfig) {
        self.transport.set_config(config);
    }

    fn call<'a>(&'a self, method: &'a str, params: Vec<Value>) -> BoxFuture<'a, Result<Value, RpcError>> {
        Box::pin(async move { self.transport.call(method, &params).await })
    }

    fn add_node<'a>(
        &'a self,
        node: &'a str,
        command: AddNodeCommand,
        v2transport: bool,
    ) -> BoxFuture<'a, Result<Value, RpcError>> {
        self.call(
            "addnode",
            vec![json!(node), json!(command.as_str()), json!(v2transport)],
        )
    }

    fn get_blockheader<'a>(&'a self, hash: &'a str) -> BoxFuture<'a, Result<Value, RpcError>> {
        self.call("getblockheader", vec![json!(hash), json!(true)])
    }

    /// `generatetoaddress` to [`REGTEST_MINING_ADDRESS`].
    fn generate_block(&self, blocks: u32) -> BoxFuture<'_, Result<Value, RpcError>> {
        self.call(
            "generatetoaddress",
            vec![json!(blocks), json!(REGTEST_MINING_ADDRESS)],
        )
    }
}
