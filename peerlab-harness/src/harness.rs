//! Node registry owned by one test case run.
//!
//! Nodes are addressed by the index returned when they were added, and are
//! stopped in that order during cleanup.

use std::path::PathBuf;
use std::sync::Arc;

use peerlab_core::config::HarnessConfig;
use peerlab_core::endpoint::EndpointSet;
use peerlab_core::generator::ConfigGenerator;
use peerlab_core::types::NodeVariant;
use peerlab_node::launch::{port_from_args, utreexod_electrum_enabled};
use peerlab_node::{
    Node, NodeBackend, NodeBuilder, ProcessBackend, Signal, WaitOptions, check_connection,
    wait_for_peers_connection,
};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::HarnessError;

/// Registry and configuration shared by the setup and scenario phases.
pub struct Harness {
    case: String,
    run_id: Uuid,
    config: HarnessConfig,
    generator: ConfigGenerator,
    backend: Arc<dyn NodeBackend>,
    nodes: Vec<Node>,
}

impl Harness {
    /// Harness that spawns real node processes.
    pub fn new(case: impl Into<String>, config: HarnessConfig) -> Result<Self, HarnessError> {
        Self::with_backend(case, config, Arc::new(ProcessBackend))
    }

    /// Harness whose nodes are bound through `backend`.
    pub fn with_backend(
        case: impl Into<String>,
        config: HarnessConfig,
        backend: Arc<dyn NodeBackend>,
    ) -> Result<Self, HarnessError> {
        config.validate()?;
        let generator = ConfigGenerator::new(&config)?;
        Ok(Self {
            case: case.into(),
            run_id: Uuid::new_v4(),
            config,
            generator,
            backend,
            nodes: Vec::new(),
        })
    }

    pub fn case(&self) -> &str {
        &self.case
    }

    /// Identifier of this run, attached to every log line of the case.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn generator(&self) -> &ConfigGenerator {
        &self.generator
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ─── Registration ────────────────────────────────────────────────

    /// Adds a node with generated endpoints and no extra arguments.
    pub async fn add_node_default_args(&mut self, variant: NodeVariant) -> Result<usize, HarnessError> {
        self.add_node_default_config(variant, Vec::new(), false).await
    }

    /// Adds a node with generated endpoints and an Electrum TLS listener.
    pub async fn add_node_with_tls(&mut self, variant: NodeVariant) -> Result<usize, HarnessError> {
        self.add_node_default_config(variant, Vec::new(), true).await
    }

    /// Adds a node with generated endpoints and caller-supplied arguments.
    pub async fn add_node_extra_args(
        &mut self,
        variant: NodeVariant,
        extra_args: Vec<String>,
    ) -> Result<usize, HarnessError> {
        self.add_node_default_config(variant, extra_args, false).await
    }

    /// Adds a node with explicit endpoints. Its configuration is locked from
    /// the start, so `run_node` retries it on the same ports.
    pub async fn add_node(
        &mut self,
        variant: NodeVariant,
        endpoints: EndpointSet,
        extra_args: Vec<String>,
    ) -> Result<usize, HarnessError> {
        self.register(variant, endpoints, extra_args, true)
    }

    async fn add_node_default_config(
        &mut self,
        variant: NodeVariant,
        extra_args: Vec<String>,
        tls: bool,
    ) -> Result<usize, HarnessError> {
        let mut endpoints = self.generator.generate(variant, tls).await?;

        // utreexod takes its Electrum listener from the arguments only
        if variant == NodeVariant::Utreexod && utreexod_electrum_enabled(&extra_args) {
            if let Some(port) = port_from_args(&extra_args, "--electrumlisteners") {
                endpoints.electrum.port = port;
            }
        }

        self.register(variant, endpoints, extra_args, false)
    }

    fn register(
        &mut self,
        variant: NodeVariant,
        endpoints: EndpointSet,
        extra_args: Vec<String>,
        locked: bool,
    ) -> Result<usize, HarnessError> {
        let ordinal = self.nodes.iter().filter(|n| n.variant() == variant).count();
        let data_dir = self.config.node_data_dir(&self.case, variant, ordinal);
        std::fs::create_dir_all(&data_dir)?;

        let timeouts = &self.config.timeouts;
        let node = NodeBuilder::new(variant, endpoints)
            .name(format!("{variant}{ordinal}"))
            .extra_args(extra_args)
            .data_dir(&data_dir)
            .binaries_dir(self.config.binaries_dir())
            .locked(locked)
            .socket_wait(timeouts.socket_wait())
            .shutdown_grace(timeouts.shutdown_grace())
            .request_timeout(timeouts.rpc_request())
            .backend(Arc::clone(&self.backend))
            .build()?;

        let index = self.nodes.len();
        info!(
            case = %self.case,
            run_id = %self.run_id,
            index,
            node = %node.name(),
            rpc_port = node.endpoints().rpc.port,
            p2p_port = node.endpoints().p2p.port,
            locked,
            data_dir = %data_dir.display(),
            "node registered"
        );
        self.nodes.push(node);
        Ok(index)
    }

    // ─── Lookup ──────────────────────────────────────────────────────

    pub fn get_node(&self, index: usize) -> Result<&Node, HarnessError> {
        let count = self.nodes.len();
        self.nodes
            .get(index)
            .ok_or(HarnessError::NodeNotFound { index, count })
    }

    pub fn get_node_mut(&mut self, index: usize) -> Result<&mut Node, HarnessError> {
        let count = self.nodes.len();
        self.nodes
            .get_mut(index)
            .ok_or(HarnessError::NodeNotFound { index, count })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    fn pair_mut(&mut self, i: usize, j: usize) -> Result<(&mut Node, &mut Node), HarnessError> {
        let count = self.nodes.len();
        for index in [i, j] {
            if index >= count {
                return Err(HarnessError::NodeNotFound { index, count });
            }
        }
        if i == j {
            return Err(HarnessError::Scenario(format!(
                "node {i} cannot be paired with itself"
            )));
        }

        let (low, high) = (i.min(j), i.max(j));
        let (head, tail) = self.nodes.split_at_mut(high);
        let (low_node, high_node) = (&mut head[low], &mut tail[0]);
        Ok(if i < j {
            (low_node, high_node)
        } else {
            (high_node, low_node)
        })
    }

    // ─── Lifecycle ───────────────────────────────────────────────────

    /// Starts node `index` with the configured number of attempts.
    pub async fn run_node(&mut self, index: usize) -> Result<(), HarnessError> {
        let attempts = self.config.timeouts.start_attempts;
        let count = self.nodes.len();
        let node = self
            .nodes
            .get_mut(index)
            .ok_or(HarnessError::NodeNotFound { index, count })?;
        peerlab_node::run_node(node, &self.generator, attempts).await?;
        Ok(())
    }

    /// Stops node `index`, returning the reply of its RPC `stop` call.
    pub async fn stop_node(&mut self, index: usize) -> Result<Option<Value>, HarnessError> {
        Ok(self.get_node_mut(index)?.stop().await?)
    }

    /// Stops every node in registration order.
    ///
    /// All nodes are attempted; failures are joined into one error.
    pub async fn stop(&mut self) -> Result<(), HarnessError> {
        let mut errors = Vec::new();

        for node in &mut self.nodes {
            if let Err(e) = node.stop().await {
                warn!(node = %node.name(), error = %e, "failed to stop node");
                errors.push(format!("{}: {}", node.name(), e));
            }
        }

        if errors.is_empty() {
            debug!(case = %self.case, nodes = self.nodes.len(), "all nodes stopped");
            Ok(())
        } else {
            Err(HarnessError::StopFailed(errors.join("; ")))
        }
    }

    /// Forced cleanup after a failed run.
    ///
    /// Each started node is stopped gracefully, then with SIGTERM, then with
    /// SIGKILL, whichever succeeds first. Returns the pids of every node
    /// that had a process.
    pub async fn teardown(&mut self) -> Vec<u32> {
        let mut pids = Vec::new();

        for node in &mut self.nodes {
            let Some(pid) = node.pid() else {
                continue;
            };
            pids.push(pid);

            let Err(stop_err) = node.stop().await else {
                continue;
            };
            warn!(node = %node.name(), pid, error = %stop_err, "graceful stop failed, sending SIGTERM");

            let Err(term_err) = node.send_signal(Signal::Term) else {
                continue;
            };
            warn!(node = %node.name(), pid, error = %term_err, "SIGTERM failed, sending SIGKILL");

            if let Err(kill_err) = node.send_signal(Signal::Kill) {
                warn!(node = %node.name(), pid, error = %kill_err, "SIGKILL failed");
            }
        }

        pids
    }

    // ─── Connections ─────────────────────────────────────────────────

    /// Waits until nodes `i` and `j` see each other (or stop seeing each
    /// other) within the configured deadline.
    pub async fn wait_for_peers_connections(
        &mut self,
        i: usize,
        j: usize,
        want_connected: bool,
    ) -> Result<(), HarnessError> {
        let options = WaitOptions::from_timeouts(&self.config.timeouts);
        let (a, b) = self.pair_mut(i, j)?;
        wait_for_peers_connection(a, b, want_connected, options).await?;
        Ok(())
    }

    /// One connection check, without waiting.
    pub async fn check_connection(
        &mut self,
        i: usize,
        j: usize,
        want_connected: bool,
    ) -> Result<bool, HarnessError> {
        let (a, b) = self.pair_mut(i, j)?;
        Ok(check_connection(a, b, want_connected).await?)
    }

    // ─── Directories ─────────────────────────────────────────────────

    /// Creates `count` data directories under `{temp_dir}/data/{base_name}`.
    pub fn create_data_dirs(&self, base_name: &str, count: usize) -> Result<Vec<PathBuf>, HarnessError> {
        Ok(self.config.create_data_dirs(base_name, count)?)
    }
}
