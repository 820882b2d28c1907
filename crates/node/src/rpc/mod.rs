//! JSON-RPC control plane of the node variants.
//!
//! [`RpcClient`] is dyn-compatible so a node can hold the client chosen for
//! its variant behind `Box<dyn RpcClient>`. Only [`RpcClient::call`] and the
//! configuration accessors are required; the typed methods are provided on
//! top of `call` and overridden where a variant's parameters differ.

mod bitcoin;
mod floresta;
mod transport;
mod utreexo;

use std::fmt;
use std::time::Duration;

use peerlab_core::endpoint::RpcConfig;
use peerlab_core::types::NodeVariant;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tracing::debug;

pub use bitcoin::BitcoinRpc;
pub use floresta::FlorestaRpc;
pub use transport::JsonRpcTransport;
pub use utreexo::UtreexoRpc;

use crate::daemon::BoxFuture;
use crate::error::RpcError;

/// Interval between socket probes in [`RpcClient::wait_on_socket`].
pub const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// `addnode` sub-command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddNodeCommand {
    Add,
    Remove,
    Onetry,
}

impl AddNodeCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Onetry => "onetry",
        }
    }
}

impl fmt::Display for AddNodeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decodes a call result into `T`, naming the method on failure.
pub fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, RpcError> {
    serde_json::from_value(value).map_err(|e| RpcError::Decode {
        method: method.to_owned(),
        reason: e.to_string(),
    })
}

/// JSON-RPC client of one node.
pub trait RpcClient: Send + Sync {
    /// Variant this client talks to.
    fn variant(&self) -> NodeVariant;

    /// Endpoint the client currently targets.
    fn config(&self) -> &RpcConfig;

    /// Retargets the client. Used when a mutable node regenerates its ports.
    fn set_config(&mut self, config: RpcConfig);

    /// Sends one request and returns the `result` member.
    fn call<'a>(&'a self, method: &'a str, params: Vec<Value>) -> BoxFuture<'a, Result<Value, RpcError>>;

    /// Polls the RPC socket until it accepts (`opened`) or refuses (`!opened`)
    /// connections.
    fn wait_on_socket(&self, opened: bool, timeout: Duration) -> BoxFuture<'_, Result<(), RpcError>> {
        Box::pin(async move {
            let addr = self.config().socket_addr();
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                let accepting = tokio::time::timeout(SOCKET_POLL_INTERVAL, TcpStream::connect(&addr))
                    .await
                    .is_ok_and(|r| r.is_ok());
                if accepting == opened {
                    debug!(%addr, opened, "rpc socket reached expected state");
                    return Ok(());
                }
                if tokio::time::Instant::now() >= deadline {
                    return Err(RpcError::SocketTimeout {
                        addr,
                        state: if opened { "open" } else { "closed" },
                        timeout,
                    });
                }
                tokio::time::sleep(SOCKET_POLL_INTERVAL).await;
            }
        })
    }

    /// `getpeerinfo`: one JSON object per connected peer.
    fn get_peer_info(&self) -> BoxFuture<'_, Result<Vec<Value>, RpcError>> {
        Box::pin(async move {
            let value = self.call("getpeerinfo", vec![]).await?;
            decode("getpeerinfo", value)
        })
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), RpcError>> {
        Box::pin(async move {
            self.call("ping", vec![]).await?;
            Ok(())
        })
    }

    /// Asks the node to shut down and returns its reply.
    fn stop(&self) -> BoxFuture<'_, Result<Value, RpcError>> {
        self.call("stop", vec![])
    }

    /// `addnode`. `v2transport` is ignored by variants without BIP324 support.
    fn add_node<'a>(
        &'a self,
        node: &'a str,
        command: AddNodeCommand,
        _v2transport: bool,
    ) -> BoxFuture<'a, Result<Value, RpcError>> {
        self.call("addnode", vec![json!(node), json!(command.as_str())])
    }

    /// `disconnectnode` by address, or by peer id when `node_id` is set.
    fn disconnect_node<'a>(
        &'a self,
        address: &'a str,
        node_id: Option<u64>,
    ) -> BoxFuture<'a, Result<Value, RpcError>> {
        let mut params = vec![json!(address)];
        if let Some(id) = node_id {
            params.push(json!(id));
        }
        self.call("disconnectnode", params)
    }

    fn get_blockhash(&self, height: u64) -> BoxFuture<'_, Result<String, RpcError>> {
        Box::pin(async move {
            let value = self.call("getblockhash", vec![json!(height)]).await?;
            decode("getblockhash", value)
        })
    }

    fn get_block_count(&self) -> BoxFuture<'_, Result<u64, RpcError>> {
        Box::pin(async move {
            let value = self.call("getblockcount", vec![]).await?;
            decode("getblockcount", value)
        })
    }

    /// `getblock`. Verbosity 0 yields a hex string, 1 a JSON object.
    fn get_block<'a>(&'a self, hash: &'a str, verbosity: u8) -> BoxFuture<'a, Result<Value, RpcError>> {
        self.call("getblock", vec![json!(hash), json!(verbosity)])
    }

    fn get_blockheader<'a>(&'a self, hash: &'a str) -> BoxFuture<'a, Result<Value, RpcError>> {
        self.call("getblockheader", vec![json!(hash)])
    }

    /// Mines `blocks` regtest blocks. Not every variant can mine.
    fn generate_block(&self, _blocks: u32) -> BoxFuture<'_, Result<Value, RpcError>> {
        let variant = self.variant();
        Box::pin(async move {
            Err(RpcError::Unsupported {
                method: "generate_block",
                variant,
            })
        })
    }
}

/// Builds the client for `variant`.
pub fn rpc_client_for(
    variant: NodeVariant,
    config: RpcConfig,
    request_timeout: Duration,
) -> Result<Box<dyn RpcClient>, RpcError> {
    let transport = JsonRpcTransport::new(config, request_timeout)?;
    Ok(match variant {
        NodeVariant::Florestad => Box::new(FlorestaRpc::new(transport)),
        NodeVariant::Utreexod => Box::new(UtreexoRpc::new(transport)),
        NodeVariant::Bitcoind => Box::new(BitcoinRpc::new(transport)),
    })
}
