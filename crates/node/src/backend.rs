//! Factory binding a launch specification to a daemon and an RPC client.
//!
//! Nodes never construct their collaborators directly; they ask a
//! [`NodeBackend`]. Production code uses [`ProcessBackend`], integration
//! tests plug in scripted backends.

use std::time::Duration;

use crate::daemon::{DynDaemon, ProcessDaemon};
use crate::error::NodeError;
use crate::launch::LaunchSpec;
use crate::rpc::{RpcClient, rpc_client_for};

/// Daemon adapter and RPC client for one node.
pub type Bound = (Box<dyn DynDaemon>, Box<dyn RpcClient>);

/// Builds the process side and the control plane of a node.
pub trait NodeBackend: Send + Sync {
    fn bind(&self, spec: &LaunchSpec, request_timeout: Duration) -> Result<Bound, NodeError>;
}

/// Spawns the real binaries and talks HTTP JSON-RPC to them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessBackend;

impl NodeBackend for ProcessBackend {
    fn bind(&self, spec: &LaunchSpec, request_timeout: Duration) -> Result<Bound, NodeError> {
        let rpc = rpc_client_for(spec.variant, spec.endpoints.rpc.clone(), request_timeout)?;
        let daemon: Box<dyn DynDaemon> = Box::new(ProcessDaemon::new(spec.clone()));
        Ok((daemon, rpc))
    }
}
