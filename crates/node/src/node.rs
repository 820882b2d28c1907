//! Node handle: one endpoint set bound to one daemon and one RPC client.
//!
//! A node's configuration is mutable until its first successful start through
//! [`run_node`](crate::lifecycle::run_node). After that every setter fails with
//! [`NodeError::ConfigLocked`]. Nodes built from explicit configuration are
//! locked from the beginning.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use peerlab_core::endpoint::{ElectrumConfig, EndpointSet, P2pConfig, RpcConfig};
use peerlab_core::generator::ConfigGenerator;
use peerlab_core::metrics as m;
use peerlab_core::types::{ConnectionInfo, EndpointKind, NodeVariant};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{NodeBackend, ProcessBackend};
use crate::daemon::{DynDaemon, Signal};
use crate::error::NodeError;
use crate::launch::LaunchSpec;
use crate::rpc::RpcClient;

pub const DEFAULT_SOCKET_WAIT: Duration = Duration::from_secs(30);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ─── AddressCheck ────────────────────────────────────────────────────

/// How a peer-list entry's address is matched once its identity matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressCheck<'a> {
    /// The peer has no stable listen address; identity alone decides.
    PeerListenPortUnconfigurable,
    /// The observer's address field does not carry the peer's listen
    /// address; identity alone decides.
    AddressFieldUnreliable,
    /// The entry's address must equal the peer's P2P address.
    Exact(&'a str),
}

impl<'a> AddressCheck<'a> {
    /// Picks the check for `observer` reading its peer list, looking for `peer`.
    pub fn select(observer: NodeVariant, peer: &'a ConnectionInfo) -> Self {
        match peer.address.as_deref() {
            None => Self::PeerListenPortUnconfigurable,
            Some(_) if !observer.reports_peer_listen_address() => Self::AddressFieldUnreliable,
            Some(address) => Self::Exact(address),
        }
    }

    pub fn accepts(&self, entry_address: Option<&str>) -> bool {
        match self {
            Self::PeerListenPortUnconfigurable | Self::AddressFieldUnreliable => true,
            Self::Exact(expected) => entry_address == Some(*expected),
        }
    }
}

/// True when `peers` (the `getpeerinfo` result of an `observer` node)
/// contains an entry for `target`.
pub fn peers_contain(observer: NodeVariant, peers: &[Value], target: &ConnectionInfo) -> bool {
    let keys = observer.peer_info_keys();
    let check = AddressCheck::select(observer, target);
    peers.iter().any(|peer| {
        let identity_matches = peer
            .get(keys.identity)
            .and_then(Value::as_str)
            .is_some_and(|agent| agent.contains(target.identity.as_str()));
        identity_matches && check.accepts(peer.get(keys.address).and_then(Value::as_str))
    })
}

// ─── NodeBuilder ─────────────────────────────────────────────────────

/// Builds a [`Node`].
///
/// `locked` defaults to true: a node created from explicit configuration
/// keeps it. Nodes created from generated defaults pass `locked(false)` so
/// [`run_node`](crate::lifecycle::run_node) may regenerate their ports.
pub struct NodeBuilder {
    variant: NodeVariant,
    endpoints: EndpointSet,
    name: Option<String>,
    extra_args: Vec<String>,
    data_dir: Option<PathBuf>,
    binaries_dir: PathBuf,
    locked: bool,
    socket_wait: Duration,
    shutdown_grace: Duration,
    request_timeout: Duration,
    backend: Arc<dyn NodeBackend>,
}

impl NodeBuilder {
    pub fn new(variant: NodeVariant, endpoints: EndpointSet) -> Self {
        Self {
            variant,
            endpoints,
            name: None,
            extra_args: Vec::new(),
            data_dir: None,
            binaries_dir: PathBuf::from("binaries"),
            locked: true,
            socket_wait: DEFAULT_SOCKET_WAIT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            backend: Arc::new(ProcessBackend),
        }
    }

    /// Name used in logs and errors. Defaults to the variant name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Defaults to `{system temp}/peerlab/{name}`.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn binaries_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.binaries_dir = dir.into();
        self
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn socket_wait(mut self, timeout: Duration) -> Self {
        self.socket_wait = timeout;
        self
    }

    pub fn shutdown_grace(mut self, timeout: Duration) -> Self {
        self.shutdown_grace = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn NodeBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn build(self) -> Result<Node, NodeError> {
        let name = self
            .name
            .unwrap_or_else(|| self.variant.as_str().to_owned());
        let data_dir = self
            .data_dir
            .unwrap_or_else(|| std::env::temp_dir().join("peerlab").join(&name));
        let spec = LaunchSpec {
            variant: self.variant,
            endpoints: self.endpoints,
            extra_args: self.extra_args,
            data_dir,
            binaries_dir: self.binaries_dir,
        };
        let (daemon, rpc) = self.backend.bind(&spec, self.request_timeout)?;

        debug!(
            node = %name,
            variant = %spec.variant,
            rpc_port = spec.endpoints.rpc.port,
            p2p_port = spec.endpoints.p2p.port,
            locked = self.locked,
            "node created"
        );

        Ok(Node {
            name,
            variant: spec.variant,
            endpoints: spec.endpoints,
            extra_args: spec.extra_args,
            data_dir: spec.data_dir,
            static_values: self.locked,
            socket_wait: self.socket_wait,
            shutdown_grace: self.shutdown_grace,
            daemon,
            rpc,
        })
    }
}

// ─── Node ────────────────────────────────────────────────────────────

pub struct Node {
    name: String,
    variant: NodeVariant,
    endpoints: EndpointSet,
    extra_args: Vec<String>,
    data_dir: PathBuf,
    static_values: bool,
    socket_wait: Duration,
    shutdown_grace: Duration,
    daemon: Box<dyn DynDaemon>,
    rpc: Box<dyn RpcClient>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("variant", &self.variant)
            .field("endpoints", &self.endpoints)
            .field("static_values", &self.static_values)
            .field("pid", &self.daemon.pid())
            .finish()
    }
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant(&self) -> NodeVariant {
        self.variant
    }

    pub fn endpoints(&self) -> &EndpointSet {
        &self.endpoints
    }

    pub fn extra_args(&self) -> &[String] {
        &self.extra_args
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// RPC client bound to this node's current RPC configuration.
    pub fn rpc(&self) -> &dyn RpcClient {
        self.rpc.as_ref()
    }

    /// `host:port` other nodes pass to `addnode`.
    pub fn p2p_url(&self) -> String {
        self.daemon.p2p_url()
    }

    pub fn port(&self, kind: EndpointKind) -> u16 {
        match kind {
            EndpointKind::Rpc => self.endpoints.rpc.port,
            EndpointKind::P2p => self.endpoints.p2p.port,
            EndpointKind::Electrum => self.endpoints.electrum.port,
        }
    }

    pub fn is_running(&mut self) -> bool {
        self.daemon.is_running()
    }

    /// Pid of the last spawned process, if any.
    pub fn pid(&self) -> Option<u32> {
        self.daemon.pid()
    }

    /// Whether the configuration is frozen.
    pub fn is_locked(&self) -> bool {
        self.static_values
    }

    pub(crate) fn lock_config(&mut self) {
        self.static_values = true;
    }

    /// Spawns the daemon and waits for its RPC socket to accept connections.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if self.daemon.is_running() {
            return Err(NodeError::AlreadyRunning {
                name: self.name.clone(),
            });
        }

        let started = Instant::now();
        self.daemon.start().await?;
        self.rpc.wait_on_socket(true, self.socket_wait).await?;

        metrics::histogram!(m::NODE_START_DURATION_SECONDS, m::LABEL_VARIANT => self.variant.as_str())
            .record(started.elapsed().as_secs_f64());
        info!(
            node = %self.name,
            variant = %self.variant,
            pid = ?self.daemon.pid(),
            rpc_port = self.endpoints.rpc.port,
            "node started"
        );
        Ok(())
    }

    /// Stops the node gracefully, escalating to signals when needed.
    ///
    /// Returns the reply of the RPC `stop` call, or `None` when the node was
    /// not running or the call failed and SIGTERM was used instead.
    pub async fn stop(&mut self) -> Result<Option<Value>, NodeError> {
        if !self.daemon.is_running() {
            debug!(node = %self.name, "stop requested for node that is not running");
            return Ok(None);
        }

        let response = match self.rpc.stop().await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(node = %self.name, error = %e, "rpc stop failed, sending SIGTERM");
                self.send_signal(Signal::Term)?;
                None
            }
        };

        match self.daemon.wait(self.shutdown_grace).await {
            Ok(()) => {}
            Err(NodeError::ExitTimeout { pid, timeout }) => {
                warn!(node = %self.name, pid, ?timeout, "node did not exit, sending SIGKILL");
                self.send_signal(Signal::Kill)?;
                self.daemon.wait(self.shutdown_grace).await?;
            }
            Err(e) => return Err(e),
        }
        self.rpc.wait_on_socket(false, self.socket_wait).await?;

        info!(node = %self.name, variant = %self.variant, "node stopped");
        Ok(response)
    }

    /// Delivers `signal` to the node process. A vanished process is not an error.
    pub fn send_signal(&mut self, signal: Signal) -> Result<(), NodeError> {
        self.daemon.signal(signal)?;
        metrics::counter!(
            m::NODE_FORCED_SIGNALS_TOTAL,
            m::LABEL_VARIANT => self.variant.as_str(),
            m::LABEL_SIGNAL => signal.to_string()
        )
        .increment(1);
        Ok(())
    }

    // ─── Configuration ───────────────────────────────────────────────

    fn ensure_mutable(&self, field: &'static str) -> Result<(), NodeError> {
        if self.static_values {
            return Err(NodeError::ConfigLocked {
                name: self.name.clone(),
                field,
            });
        }
        Ok(())
    }

    pub fn set_rpc_config(&mut self, config: RpcConfig) -> Result<(), NodeError> {
        self.ensure_mutable("rpc config")?;
        self.daemon.set_rpc_config(config.clone());
        self.rpc.set_config(config.clone());
        self.endpoints.rpc = config;
        Ok(())
    }

    pub fn set_p2p_config(&mut self, config: P2pConfig) -> Result<(), NodeError> {
        self.ensure_mutable("p2p config")?;
        self.daemon.set_p2p_config(config.clone());
        self.endpoints.p2p = config;
        Ok(())
    }

    pub fn set_electrum_config(&mut self, config: ElectrumConfig) -> Result<(), NodeError> {
        self.ensure_mutable("electrum config")?;
        self.daemon.set_electrum_config(config.clone());
        self.endpoints.electrum = config;
        Ok(())
    }

    pub fn set_extra_args(&mut self, args: Vec<String>) -> Result<(), NodeError> {
        self.ensure_mutable("extra args")?;
        self.daemon.set_extra_args(args.clone());
        self.extra_args = args;
        Ok(())
    }

    /// Draws fresh RPC, P2P and Electrum endpoints. TLS is kept if it was on.
    ///
    /// The replaced ports go back to the generator's allocator.
    pub async fn regenerate_configs(&mut self, generator: &ConfigGenerator) -> Result<(), NodeError> {
        self.ensure_mutable("endpoints")?;
        let tls = self.endpoints.electrum.tls.is_some();
        let old_ports = self.endpoints.ports();
        let rpc = generator.rpc(self.variant).await?;
        let p2p = generator.p2p().await?;
        let electrum = generator.electrum(tls).await?;
        debug!(
            node = %self.name,
            rpc_port = rpc.port,
            p2p_port = p2p.port,
            electrum_port = electrum.port,
            "regenerated endpoints"
        );
        self.set_rpc_config(rpc)?;
        self.set_p2p_config(p2p)?;
        self.set_electrum_config(electrum)?;
        for port in old_ports {
            generator.allocator().release(port);
        }
        Ok(())
    }

    // ─── Peers ───────────────────────────────────────────────────────

    /// How other nodes recognize this one in their peer lists.
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            identity: self.variant.identity().to_owned(),
            address: self
                .variant
                .has_configurable_p2p_port()
                .then(|| self.p2p_url()),
        }
    }

    /// Whether `other` appears in this node's current peer list.
    pub async fn is_peer_connected(&self, other: &Node) -> Result<bool, NodeError> {
        let peers = self.rpc.get_peer_info().await?;
        let target = other.connection_info();
        let connected = peers_contain(self.variant, &peers, &target);
        debug!(
            node = %self.name,
            peer = %other.name,
            peers = peers.len(),
            connected,
            "checked peer list"
        );
        Ok(connected)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mock::MockNetwork;

    fn endpoints(port: u16) -> EndpointSet {
        EndpointSet {
            rpc: RpcConfig {
                host: "127.0.0.1".to_owned(),
                port,
                user: None,
                password: None,
            },
            p2p: P2pConfig {
                host: "127.0.0.1".to_owned(),
                port: port + 1,
            },
            electrum: ElectrumConfig {
                host: "127.0.0.1".to_owned(),
                port: port + 2,
                tls: None,
            },
        }
    }

    fn node(network: &MockNetwork, variant: NodeVariant, port: u16, locked: bool) -> Node {
        NodeBuilder::new(variant, endpoints(port))
            .name(format!("{variant}0"))
            .locked(locked)
            .backend(network.backend())
            .build()
            .unwrap()
    }

    #[test]
    fn connection_info_address_absent_only_for_florestad() {
        let network = MockNetwork::new();
        for variant in NodeVariant::ALL {
            let info = node(&network, variant, 20000, true).connection_info();
            assert!(!info.identity.is_empty());
            assert_eq!(
                info.address.is_none(),
                variant == NodeVariant::Florestad,
                "{variant}"
            );
        }
    }

    #[test]
    fn connection_info_address_is_p2p_url() {
        let network = MockNetwork::new();
        let info = node(&network, NodeVariant::Bitcoind, 20000, true).connection_info();
        assert_eq!(info.identity, "Satoshi");
        assert_eq!(info.address.as_deref(), Some("127.0.0.1:20001"));
    }

    #[test]
    fn address_check_cases() {
        let florestad = ConnectionInfo {
            identity: "Floresta".to_owned(),
            address: None,
        };
        let bitcoind = ConnectionInfo {
            identity: "Satoshi".to_owned(),
            address: Some("127.0.0.1:20001".to_owned()),
        };

        assert_eq!(
            AddressCheck::select(NodeVariant::Bitcoind, &florestad),
            AddressCheck::PeerListenPortUnconfigurable
        );
        assert_eq!(
            AddressCheck::select(NodeVariant::Utreexod, &bitcoind),
            AddressCheck::AddressFieldUnreliable
        );
        assert_eq!(
            AddressCheck::select(NodeVariant::Florestad, &bitcoind),
            AddressCheck::Exact("127.0.0.1:20001")
        );
        assert!(!AddressCheck::Exact("127.0.0.1:20001").accepts(Some("127.0.0.1:20002")));
        assert!(!AddressCheck::Exact("127.0.0.1:20001").accepts(None));
    }

    #[test]
    fn peers_contain_matches_identity_substring_and_exact_address() {
        let target = ConnectionInfo {
            identity: "Satoshi".to_owned(),
            address: Some("127.0.0.1:20001".to_owned()),
        };
        let peers = vec![json!({
            "id": 0,
            "user_agent": "/Satoshi:28.1.0/",
            "address": "127.0.0.1:20001",
        })];
        assert!(peers_contain(NodeVariant::Florestad, &peers, &target));

        let wrong_port = vec![json!({
            "user_agent": "/Satoshi:28.1.0/",
            "address": "127.0.0.1:20009",
        })];
        assert!(!peers_contain(NodeVariant::Florestad, &wrong_port, &target));

        // bitcoind reads subver/addr, not user_agent/address
        assert!(!peers_contain(NodeVariant::Bitcoind, &peers, &target));
    }

    #[test]
    fn utreexod_observer_ignores_address_field() {
        let target = ConnectionInfo {
            identity: "Satoshi".to_owned(),
            address: Some("127.0.0.1:20001".to_owned()),
        };
        let peers = vec![json!({ "subver": "/Satoshi:28.1.0/", "addr": "127.0.0.1:53412" })];
        assert!(peers_contain(NodeVariant::Utreexod, &peers, &target));
    }

    #[test]
    fn inbound_peer_address_does_not_match_listen_address() {
        let utreexod = ConnectionInfo {
            identity: "utreexod".to_owned(),
            address: Some("127.0.0.1:30001".to_owned()),
        };
        let peers = vec![json!({
            "subver": "/btcwire:0.5.0/utreexod:0.4.1/",
            "addr": "127.0.0.1:53412",
            "inbound": true,
        })];
        assert!(!peers_contain(NodeVariant::Bitcoind, &peers, &utreexod));
    }

    #[test]
    fn setters_fail_when_locked() {
        let network = MockNetwork::new();
        let mut node = node(&network, NodeVariant::Bitcoind, 20000, true);

        let err = node
            .set_p2p_config(P2pConfig {
                host: "127.0.0.1".to_owned(),
                port: 30000,
            })
            .unwrap_err();

        assert!(matches!(err, NodeError::ConfigLocked { field: "p2p config", .. }));
        assert_eq!(node.port(EndpointKind::P2p), 20001, "config must be unchanged");
        assert!(node.set_extra_args(vec![]).is_err());
        assert!(node.set_rpc_config(endpoints(1).rpc).is_err());
        assert!(node.set_electrum_config(endpoints(1).electrum).is_err());
    }

    #[tokio::test]
    async fn mutable_setters_reach_daemon_and_rpc_client() {
        let network = MockNetwork::new();
        let mut node = node(&network, NodeVariant::Bitcoind, 20000, false);

        node.set_rpc_config(endpoints(30000).rpc).unwrap();
        node.set_extra_args(vec!["-v2transport=1".to_owned()]).unwrap();
        node.start().await.unwrap();

        assert_eq!(node.rpc().config().port, 30000);
        assert_eq!(network.attempted_rpc_ports(0), vec![30000]);
        assert_eq!(network.extra_args(0), vec!["-v2transport=1".to_owned()]);
    }

    #[tokio::test]
    async fn start_twice_fails_with_already_running() {
        let network = MockNetwork::new();
        let mut node = node(&network, NodeVariant::Florestad, 20000, true);

        node.start().await.unwrap();
        let err = node.start().await.unwrap_err();

        assert!(matches!(err, NodeError::AlreadyRunning { .. }));
    }

    #[tokio::test]
    async fn stop_returns_graceful_reply() {
        let network = MockNetwork::new();
        let mut node = node(&network, NodeVariant::Bitcoind, 20000, true);
        node.start().await.unwrap();

        let reply = node.stop().await.unwrap();

        assert!(reply.is_some());
        assert!(!node.is_running());
        assert!(network.signals(0).is_empty());
    }

    #[tokio::test]
    async fn stop_of_idle_node_returns_none() {
        let network = MockNetwork::new();
        let mut node = node(&network, NodeVariant::Bitcoind, 20000, true);
        assert!(node.stop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_rpc_stop_falls_back_to_sigterm() {
        let network = MockNetwork::new();
        let mut node = node(&network, NodeVariant::Bitcoind, 20000, true);
        node.start().await.unwrap();
        network.fail_rpc_stop(0);

        let reply = node.stop().await.unwrap();

        assert!(reply.is_none());
        assert_eq!(network.signals(0), vec![Signal::Term]);
        assert!(!node.is_running());
    }

    #[tokio::test]
    async fn stuck_process_is_killed() {
        let network = MockNetwork::new();
        let mut node = node(&network, NodeVariant::Utreexod, 20000, true);
        node.start().await.unwrap();
        network.fail_rpc_stop(0);
        network.ignore_sigterm(0);

        node.stop().await.unwrap();

        assert_eq!(network.signals(0), vec![Signal::Term, Signal::Kill]);
        assert!(!node.is_running());
    }

    #[tokio::test]
    async fn regenerate_configs_draws_new_ports_and_keeps_tls_off() {
        let temp = tempfile::tempdir().unwrap();
        let allocator = Arc::new(peerlab_core::ports::PortAllocator::new(40000, 40100).unwrap());
        let generator = ConfigGenerator::with_allocator(allocator, temp.path(), "florestad");
        let network = MockNetwork::new();
        let mut node = node(&network, NodeVariant::Bitcoind, 20000, false);

        node.regenerate_configs(&generator).await.unwrap();

        assert!((40000..=40100).contains(&node.port(EndpointKind::Rpc)));
        assert!((40000..=40100).contains(&node.port(EndpointKind::P2p)));
        assert!(node.endpoints().electrum.tls.is_none());
        assert_eq!(node.rpc().config().user.as_deref(), Some("test"));
    }

    #[tokio::test]
    async fn regenerate_configs_releases_replaced_ports() {
        // Given: a node whose endpoints came from the allocator
        let temp = tempfile::tempdir().unwrap();
        let allocator = Arc::new(peerlab_core::ports::PortAllocator::new(40200, 40300).unwrap());
        let generator =
            ConfigGenerator::with_allocator(Arc::clone(&allocator), temp.path(), "florestad");
        let network = MockNetwork::new();
        let endpoints = generator.generate(NodeVariant::Bitcoind, false).await.unwrap();
        let old_ports = endpoints.ports();
        let mut node = NodeBuilder::new(NodeVariant::Bitcoind, endpoints)
            .backend(network.backend())
            .locked(false)
            .build()
            .unwrap();

        // When
        node.regenerate_configs(&generator).await.unwrap();

        // Then: only the new endpoints stay reserved
        assert_eq!(allocator.reserved_count(), 3);
        for port in node.endpoints().ports() {
            assert!(allocator.is_reserved(port), "{port}");
        }
        for port in old_ports {
            assert!(!allocator.is_reserved(port), "{port} must be released");
        }
    }

    #[tokio::test]
    async fn is_peer_connected_reads_observer_peer_list() {
        let network = MockNetwork::new();
        let mut bitcoind = node(&network, NodeVariant::Bitcoind, 20000, true);
        let mut florestad = node(&network, NodeVariant::Florestad, 21000, true);
        bitcoind.start().await.unwrap();
        florestad.start().await.unwrap();

        assert!(!florestad.is_peer_connected(&bitcoind).await.unwrap());

        florestad
            .rpc()
            .add_node(&bitcoind.p2p_url(), crate::rpc::AddNodeCommand::Add, false)
            .await
            .unwrap();

        assert!(florestad.is_peer_connected(&bitcoind).await.unwrap());
        assert!(bitcoind.is_peer_connected(&florestad).await.unwrap());
    }
}
