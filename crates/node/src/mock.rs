//! In-memory node backend for tests.
//!
//! [`MockNetwork`] simulates every node bound through it: process state,
//! peer links created by `addnode`, and a small subset of RPC methods. Nodes
//! are addressed by bind order, which matches harness registration order.
//!
//! Failure injection:
//! - `fail_next_starts`: the next N `start()` calls fail like a port race
//! - `fail_rpc_stop`: RPC `stop` fails, forcing signal escalation
//! - `ignore_sigterm`: SIGTERM is recorded but the process keeps running
//! - `delay_links`: `addnode` links only appear after N `ping`s
//!
//! Links remember which side dialed. A node lists the peers it dialed under
//! their listen address and inbound peers under an ephemeral `127.0.0.1`
//! port, the way real daemons do.
//!
//! Linked nodes share their best height, so a node that mines pushes its
//! blocks to every peer. Block hashes are the height in hex, except for the
//! regtest genesis block.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use peerlab_core::endpoint::{ElectrumConfig, EndpointSet, P2pConfig, RpcConfig};
use peerlab_core::types::NodeVariant;
use serde_json::{Value, json};

use crate::backend::{Bound, NodeBackend};
use crate::daemon::{BoxFuture, Daemon, DynDaemon, Signal};
use crate::error::{NodeError, RpcError};
use crate::launch::LaunchSpec;
use crate::rpc::RpcClient;

const FIRST_PID: u32 = 4000;

const REGTEST_GENESIS_HASH: &str =
    "0f9188f13cb7b2c71f2a335e3a4fc328bf5beb436012afca590b1a11466e2206";

fn block_hash(height: u64) -> String {
    if height == 0 {
        REGTEST_GENESIS_HASH.to_owned()
    } else {
        format!("{height:064x}")
    }
}

fn block_header(hash: &str) -> Value {
    if hash == REGTEST_GENESIS_HASH {
        return json!({
            "hash": hash,
            "version": 1,
            "prev_blockhash": "0".repeat(64),
            "merkle_root": "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
            "time": 1296688602,
            "bits": 545259519,
            "nonce": 2,
        });
    }
    json!({ "hash": hash, "version": 1 })
}

#[derive(Debug)]
struct MockNode {
    variant: NodeVariant,
    endpoints: EndpointSet,
    extra_args: Vec<String>,
    running: bool,
    pid: Option<u32>,
    start_failures: u32,
    fail_rpc_stop: bool,
    ignore_sigterm: bool,
    attempted_rpc_ports: Vec<u16>,
    signals: Vec<Signal>,
    pings: u32,
    calls: Vec<String>,
    blocks: u64,
}

impl MockNode {
    fn new(spec: &LaunchSpec) -> Self {
        Self {
            variant: spec.variant,
            endpoints: spec.endpoints.clone(),
            extra_args: spec.extra_args.clone(),
            running: false,
            pid: None,
            start_failures: 0,
            fail_rpc_stop: false,
            ignore_sigterm: false,
            attempted_rpc_ports: Vec::new(),
            signals: Vec::new(),
            pings: 0,
            calls: Vec::new(),
            blocks: 0,
        }
    }
}

#[derive(Debug)]
struct PendingLink {
    a: usize,
    b: usize,
    pings_left: u32,
}

#[derive(Debug, Default)]
struct NetworkState {
    nodes: Vec<MockNode>,
    /// Undirected link key -> index of the node that dialed.
    links: HashMap<(usize, usize), usize>,
    pending: Vec<PendingLink>,
    link_delay: u32,
    next_pid: u32,
}

fn key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

impl NetworkState {
    /// `a` dials `b`. An existing link keeps its original direction.
    fn link(&mut self, a: usize, b: usize) {
        if self.nodes[a].running && self.nodes[b].running {
            self.links.entry(key(a, b)).or_insert(a);
            self.sync_blocks(a);
        }
    }

    /// Spreads the best height across the component linked to `from`.
    fn sync_blocks(&mut self, from: usize) {
        let mut component = vec![from];
        let mut i = 0;
        while i < component.len() {
            let node = component[i];
            for j in 0..self.nodes.len() {
                if !component.contains(&j) && self.linked(node, j) {
                    component.push(j);
                }
            }
            i += 1;
        }
        let best = component.iter().map(|&j| self.nodes[j].blocks).max().unwrap_or(0);
        for j in component {
            self.nodes[j].blocks = best;
        }
    }

    fn unlink(&mut self, a: usize, b: usize) -> bool {
        self.links.remove(&key(a, b)).is_some()
    }

    fn linked(&self, a: usize, b: usize) -> bool {
        self.links.contains_key(&key(a, b))
    }

    /// True when `peer` dialed `observer`.
    fn is_inbound(&self, observer: usize, peer: usize) -> bool {
        self.links.get(&key(observer, peer)) == Some(&peer)
    }

    fn shut_down(&mut self, id: usize) {
        self.nodes[id].running = false;
        self.links.retain(|&(a, b), _| a != id && b != id);
        self.pending.retain(|p| p.a != id && p.b != id);
    }

    fn peer_by_address(&self, id: usize, address: &str) -> Option<usize> {
        (0..self.nodes.len()).find(|&j| j != id && self.nodes[j].endpoints.p2p.url() == address)
    }

    fn tick_pending(&mut self) {
        let mut ready = Vec::new();
        self.pending.retain_mut(|p| {
            p.pings_left = p.pings_left.saturating_sub(1);
            if p.pings_left == 0 {
                ready.push((p.a, p.b));
                false
            } else {
                true
            }
        });
        for (a, b) in ready {
            self.link(a, b);
        }
    }

    fn peer_info(&self, id: usize) -> Value {
        let observer = self.nodes[id].variant;
        let keys = observer.peer_info_keys();
        let peers: Vec<Value> = (0..self.nodes.len())
            .filter(|&j| j != id && self.linked(id, j))
            .map(|j| {
                let peer = &self.nodes[j];
                let inbound = self.is_inbound(id, j);
                let address = if observer.reports_peer_listen_address() && !inbound {
                    peer.endpoints.p2p.url()
                } else {
                    format!("127.0.0.1:{}", 50000 + j)
                };
                let mut entry = serde_json::Map::new();
                entry.insert("id".to_owned(), json!(j));
                entry.insert(
                    keys.identity.to_owned(),
                    json!(format!("/{}:0.1.0/", peer.variant.identity())),
                );
                entry.insert(keys.address.to_owned(), json!(address));
                entry.insert("inbound".to_owned(), json!(inbound));
                Value::Object(entry)
            })
            .collect();
        Value::Array(peers)
    }

    fn handle(&mut self, id: usize, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        self.nodes[id].calls.push(method.to_owned());
        if !self.nodes[id].running {
            return Err(RpcError::Transport {
                method: method.to_owned(),
                reason: "connection refused".to_owned(),
            });
        }

        match method {
            "ping" => {
                self.nodes[id].pings += 1;
                self.tick_pending();
                Ok(Value::Null)
            }
            "getpeerinfo" => Ok(self.peer_info(id)),
            "addnode" => {
                let address = params.first().and_then(Value::as_str).unwrap_or_default();
                let command = params.get(1).and_then(Value::as_str).unwrap_or("add");
                if let Some(peer) = self.peer_by_address(id, address) {
                    match command {
                        "remove" => {
                            self.unlink(id, peer);
                        }
                        _ if self.link_delay > 0 => self.pending.push(PendingLink {
                            a: id,
                            b: peer,
                            pings_left: self.link_delay,
                        }),
                        _ => self.link(id, peer),
                    }
                }
                Ok(Value::Null)
            }
            "disconnectnode" => {
                let address = params.first().and_then(Value::as_str).unwrap_or_default();
                let node_id = params.get(1).and_then(Value::as_u64);
                let target = match node_id {
                    Some(peer) if address.is_empty() => {
                        usize::try_from(peer).ok().filter(|&p| p < self.nodes.len())
                    }
                    Some(_) => None,
                    None => self.peer_by_address(id, address),
                };
                match target {
                    Some(peer) if peer != id && self.unlink(id, peer) => Ok(Value::Null),
                    _ => Err(RpcError::Http {
                        method: method.to_owned(),
                        status: 400,
                        body: "Peer not found".to_owned(),
                    }),
                }
            }
            "stop" => {
                if self.nodes[id].fail_rpc_stop {
                    return Err(RpcError::Transport {
                        method: method.to_owned(),
                        reason: "connection reset by peer".to_owned(),
                    });
                }
                self.shut_down(id);
                Ok(json!(format!("{} stopping", self.nodes[id].variant.identity())))
            }
            "getblockcount" => Ok(json!(self.nodes[id].blocks)),
            "generate" | "generatetoaddress" => {
                let count = params.first().and_then(Value::as_u64).unwrap_or(1);
                let start = self.nodes[id].blocks + 1;
                self.nodes[id].blocks += count;
                self.sync_blocks(id);
                Ok(json!((start..start + count).map(block_hash).collect::<Vec<_>>()))
            }
            "getblockhash" => {
                let height = params.first().and_then(Value::as_u64).unwrap_or(0);
                Ok(json!(block_hash(height)))
            }
            "getblockheader" => {
                let hash = params.first().and_then(Value::as_str).unwrap_or_default();
                Ok(block_header(hash))
            }
            "getblock" => {
                let hash = params.first().and_then(Value::as_str).unwrap_or_default();
                match params.get(1).and_then(Value::as_u64) {
                    Some(0) => Ok(json!(format!("00{hash}"))),
                    _ => Ok(block_header(hash)),
                }
            }
            _ => Err(RpcError::Rpc {
                method: method.to_owned(),
                code: -32601,
                message: "Method not found".to_owned(),
            }),
        }
    }
}

// ─── MockNetwork ─────────────────────────────────────────────────────

/// Shared simulation behind every mock daemon and RPC client.
#[derive(Debug, Clone, Default)]
pub struct MockNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Backend to hand to [`NodeBuilder::backend`](crate::node::NodeBuilder::backend).
    pub fn backend(&self) -> Arc<dyn NodeBackend> {
        Arc::new(self.clone())
    }

    /// Number of nodes bound so far.
    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }

    pub fn fail_next_starts(&self, node: usize, count: u32) {
        self.lock().nodes[node].start_failures = count;
    }

    pub fn fail_rpc_stop(&self, node: usize) {
        self.lock().nodes[node].fail_rpc_stop = true;
    }

    pub fn ignore_sigterm(&self, node: usize) {
        self.lock().nodes[node].ignore_sigterm = true;
    }

    /// Links requested with `addnode` appear after `pings` pings.
    pub fn delay_links(&self, pings: u32) {
        self.lock().link_delay = pings;
    }

    /// Links `a` to `b` as if `a` had run `addnode`.
    pub fn connect(&self, a: usize, b: usize) {
        self.lock().link(a, b);
    }

    pub fn disconnect(&self, a: usize, b: usize) {
        self.lock().unlink(a, b);
    }

    pub fn is_linked(&self, a: usize, b: usize) -> bool {
        self.lock().linked(a, b)
    }

    /// Kills a node without going through its handle.
    pub fn crash(&self, node: usize) {
        self.lock().shut_down(node);
    }

    pub fn is_running(&self, node: usize) -> bool {
        self.lock().nodes[node].running
    }

    /// RPC port in effect at every `start()` attempt, failed ones included.
    pub fn attempted_rpc_ports(&self, node: usize) -> Vec<u16> {
        self.lock().nodes[node].attempted_rpc_ports.clone()
    }

    pub fn extra_args(&self, node: usize) -> Vec<String> {
        self.lock().nodes[node].extra_args.clone()
    }

    pub fn signals(&self, node: usize) -> Vec<Signal> {
        self.lock().nodes[node].signals.clone()
    }

    pub fn pings(&self, node: usize) -> u32 {
        self.lock().nodes[node].pings
    }

    /// RPC methods called on `node`, in order.
    pub fn calls(&self, node: usize) -> Vec<String> {
        self.lock().nodes[node].calls.clone()
    }
}

impl NodeBackend for MockNetwork {
    fn bind(&self, spec: &LaunchSpec, _request_timeout: Duration) -> Result<Bound, NodeError> {
        let id = {
            let mut state = self.lock();
            state.nodes.push(MockNode::new(spec));
            state.nodes.len() - 1
        };
        let daemon: Box<dyn DynDaemon> = Box::new(MockDaemon {
            network: self.clone(),
            id,
        });
        let rpc: Box<dyn RpcClient> = Box::new(MockRpc {
            network: self.clone(),
            id,
            variant: spec.variant,
            config: spec.endpoints.rpc.clone(),
        });
        Ok((daemon, rpc))
    }
}

// ─── MockDaemon ──────────────────────────────────────────────────────

pub struct MockDaemon {
    network: MockNetwork,
    id: usize,
}

impl MockDaemon {
    fn try_start(&self) -> Result<(), NodeError> {
        let mut state = self.network.lock();
        let pid = FIRST_PID + state.next_pid;
        state.next_pid += 1;
        let node = &mut state.nodes[self.id];
        if node.running {
            return Err(NodeError::AlreadyRunning {
                name: node.variant.to_string(),
            });
        }
        node.attempted_rpc_ports.push(node.endpoints.rpc.port);
        if node.start_failures > 0 {
            node.start_failures -= 1;
            return Err(NodeError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!("port {} already in use", node.endpoints.rpc.port),
            )));
        }
        node.running = true;
        node.pid = Some(pid);
        Ok(())
    }
}

impl Daemon for MockDaemon {
    fn variant(&self) -> NodeVariant {
        self.network.lock().nodes[self.id].variant
    }

    fn start(&mut self) -> impl Future<Output = Result<(), NodeError>> + Send {
        let result = self.try_start();
        async move { result }
    }

    fn is_running(&mut self) -> bool {
        self.network.lock().nodes[self.id].running
    }

    fn pid(&self) -> Option<u32> {
        self.network.lock().nodes[self.id].pid
    }

    fn signal(&mut self, signal: Signal) -> Result<(), NodeError> {
        let mut state = self.network.lock();
        if !state.nodes[self.id].running {
            return Ok(());
        }
        state.nodes[self.id].signals.push(signal);
        if signal == Signal::Kill || !state.nodes[self.id].ignore_sigterm {
            state.shut_down(self.id);
        }
        Ok(())
    }

    fn wait(&mut self, timeout: Duration) -> impl Future<Output = Result<(), NodeError>> + Send {
        let state = self.network.lock();
        let node = &state.nodes[self.id];
        let result = if node.running {
            Err(NodeError::ExitTimeout {
                pid: node.pid.unwrap_or_default(),
                timeout,
            })
        } else {
            Ok(())
        };
        drop(state);
        async move { result }
    }

    fn p2p_url(&self) -> String {
        self.network.lock().nodes[self.id].endpoints.p2p.url()
    }

    fn set_rpc_config(&mut self, config: RpcConfig) {
        self.network.lock().nodes[self.id].endpoints.rpc = config;
    }

    fn set_p2p_config(&mut self, config: P2pConfig) {
        self.network.lock().nodes[self.id].endpoints.p2p = config;
    }

    fn set_electrum_config(&mut self, config: ElectrumConfig) {
        self.network.lock().nodes[self.id].endpoints.electrum = config;
    }

    fn set_extra_args(&mut self, args: Vec<String>) {
        self.network.lock().nodes[self.id].extra_args = args;
    }
}

// ─── MockRpc ─────────────────────────────────────────────────────────

pub struct MockRpc {
    network: MockNetwork,
    id: usize,
    variant: NodeVariant,
    config: RpcConfig,
}

impl RpcClient for MockRpc {
    fn variant(&self) -> NodeVariant {
        self.variant
    }

    fn config(&self) -> &RpcConfig {
        &self.config
    }

    fn set_config(&mut self, config: RpcConfig) {
        self.config = config;
    }

    fn call<'a>(&'a self, method: &'a str, params: Vec<Value>) -> BoxFuture<'a, Result<Value, RpcError>> {
        let result = self.network.lock().handle(self.id, method, &params);
        Box::pin(async move { result })
    }

    fn wait_on_socket(&self, opened: bool, timeout: Duration) -> BoxFuture<'_, Result<(), RpcError>> {
        let running = self.network.is_running(self.id);
        let addr = self.config.socket_addr();
        Box::pin(async move {
            if running == opened {
                Ok(())
            } else {
                Err(RpcError::SocketTimeout {
                    addr,
                    state: if opened { "open" } else { "closed" },
                    timeout,
                })
            }
        })
    }
}
