//! florestad client.

use peerlab_core::endpoint::RpcConfig;
use peerlab_core::types::NodeVariant;
use serde_json::{Value, json};

use super::{AddNodeCommand, JsonRpcTransport, RpcClient};
use crate::daemon::BoxFuture;
use crate::error::RpcError;

/// florestad takes no credentials and accepts a `v2transport` flag on `addnode`.
pub struct FlorestaRpc {
    transport: JsonRpcTransport,
}

impl FlorestaRpc {
    pub fn new(transport: JsonRpcTransport) -> Self {
        Self { transport }
    }
}

impl RpcClient for FlorestaRpc {
    fn variant(&self) -> NodeVariant {
        NodeVariant::Florestad
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
}
