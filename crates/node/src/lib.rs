//! Node handles for peerlab.
//!
//! A [`Node`] binds one generated endpoint set to a daemon adapter and a
//! JSON-RPC client chosen by variant. On top of it this crate provides the
//! bounded-retry startup ([`run_node`]) and the connection-state monitor
//! ([`wait_for_peers_connection`]).
//!
//! ```text
//! NodeBuilder ──► NodeBackend::bind ──► (DynDaemon, RpcClient)
//!      │
//!      ▼
//!    Node ──► lifecycle::run_node ──► monitor::wait_for_peers_connection
//! ```

pub mod backend;
pub mod daemon;
pub mod error;
pub mod launch;
pub mod lifecycle;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;
pub mod monitor;
pub mod node;
pub mod rpc;

pub use backend::{NodeBackend, ProcessBackend};
pub use daemon::{BoxFuture, Daemon, DynDaemon, ProcessDaemon, Signal};
pub use error::{NodeError, RpcError};
pub use launch::LaunchSpec;
pub use lifecycle::{DEFAULT_START_ATTEMPTS, run_node};
pub use monitor::{WaitOptions, check_connection, wait_for_peers_connection};
pub use node::{AddressCheck, Node, NodeBuilder};
pub use rpc::{AddNodeCommand, RpcClient, rpc_client_for};
