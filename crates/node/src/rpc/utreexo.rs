//! utreexod client.

use peerlab_core::endpoint::RpcConfig;
use peerlab_core::types::NodeVariant;
use serde_json::{Value, json};

use super::{JsonRpcTransport, RpcClient};
use crate::daemon::BoxFuture;
use crate::error::RpcError;

/// utreexod (btcd RPC dialect): no BIP324, mines with `generate`.
pub struct UtreexoRpc {
    transport: JsonRpcTransport,
}

impl UtreexoRpc {
    pub fn new(transport: JsonRpcTransport) -> Self {
        Self { transport }
    }
}

impl RpcClient for UtreexoRpc {
    fn variant(&self) -> NodeVariant {
        NodeVariant::Utreexod
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

    fn generate_block(&self, blocks: u32) -> BoxFuture<'_, Result<Value, RpcError>> {
        self.call("generate", vec![json!(blocks)])
    }
}
