//! Error types for node lifecycle and RPC operations.

use std::time::Duration;

use peerlab_core::error::ConfigError;
use peerlab_core::types::NodeVariant;

use crate::daemon::Signal;

/// Errors raised while talking to a node over JSON-RPC.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The request never produced an HTTP response (connection refused, timeout).
    #[error("rpc transport error calling '{method}': {reason}")]
    Transport { method: String, reason: String },

    /// The server answered with a non-success HTTP status.
    #[error("rpc '{method}' returned http {status}: {body}")]
    Http {
        method: String,
        status: u16,
        body: String,
    },

    /// The server answered 200 with a JSON-RPC error object.
    #[error("rpc '{method}' failed with code {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode '{method}' response: {reason}")]
    Decode { method: String, reason: String },

    /// The RPC socket did not reach the requested state in time.
    #[error("rpc socket {addr} did not become {state} within {timeout:?}")]
    SocketTimeout {
        addr: String,
        state: &'static str,
        timeout: Duration,
    },

    /// The variant has no equivalent of this call.
    #[error("'{method}' is not supported by {variant}")]
    Unsupported {
        method: &'static str,
        variant: NodeVariant,
    },
}

impl RpcError {
    /// True when the server rejected the request at the HTTP layer.
    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http { .. })
    }

    /// True for HTTP statuses and JSON-RPC error objects, i.e. the node
    /// understood the request and refused it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Rpc { .. })
    }
}

/// Errors raised by node lifecycle and connection-state operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("node '{name}' is already running")]
    AlreadyRunning { name: String },

    #[error("cannot modify {field} of node '{name}': configuration is locked after first start")]
    ConfigLocked { name: String, field: &'static str },

    #[error("failed to spawn '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to send {signal} to pid {pid}: {reason}")]
    Signal {
        pid: u32,
        signal: Signal,
        reason: String,
    },

    #[error("process {pid} did not exit within {timeout:?}")]
    ExitTimeout { pid: u32, timeout: Duration },

    #[error("error starting node '{name}' ({variant}) after {attempts} attempts: {source}")]
    StartupFailed {
        name: String,
        variant: NodeVariant,
        attempts: u32,
        #[source]
        source: Box<NodeError>,
    },

    #[error("neither peer is running: {a}, {b}")]
    NeitherRunning { a: String, b: String },

    #[error(
        "cannot check connection state: only one peer is running ({a} running: {a_running}, {b} running: {b_running})"
    )]
    OnlyOneRunning {
        a: String,
        b: String,
        a_running: bool,
        b_running: bool,
    },

    #[error(
        "peers {a} and {b} failed to reach the expected connection state within {deadline:?} (expected connected: {want_connected})"
    )]
    ConnectionTimeout {
        a: String,
        b: String,
        want_connected: bool,
        deadline: Duration,
    },

    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
