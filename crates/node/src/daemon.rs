//! Daemon process abstraction.
//!
//! The [`Daemon`] trait covers what a node handle needs from the OS process
//! behind it: spawn, liveness, signal delivery, exit wait and pre-start
//! configuration. [`ProcessDaemon`] is the production implementation that
//! spawns the real binary; tests provide scripted implementations.
//!
//! ```text
//! Node ──► DynDaemon ──► ProcessDaemon ──► florestad | utreexod | bitcoind
//! ```

use std::fmt;
use std::fs::OpenOptions;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use peerlab_core::endpoint::{ElectrumConfig, P2pConfig, RpcConfig};
use peerlab_core::types::NodeVariant;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::NodeError;
use crate::launch::LaunchSpec;

/// Boxed future used by the dyn-compatible traits of this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Signals the harness may deliver to a node process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGTERM
    Term,
    /// SIGKILL
    Kill,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Term => write!(f, "SIGTERM"),
            Self::Kill => write!(f, "SIGKILL"),
        }
    }
}

// ─── Daemon Trait ────────────────────────────────────────────────────

/// A node process that can be started, signalled and reconfigured before start.
///
/// Configuration setters only affect the next `start`.
pub trait Daemon: Send + Sync + 'static {
    /// Variant this daemon launches.
    fn variant(&self) -> NodeVariant;

    /// Spawns the process. Returns once the OS reports the process as created;
    /// readiness of the RPC socket is checked by the caller.
    fn start(&mut self) -> impl Future<Output = Result<(), NodeError>> + Send;

    /// Whether the spawned process is still alive.
    fn is_running(&mut self) -> bool;

    /// Pid of the most recently spawned process, kept after exit for diagnostics.
    fn pid(&self) -> Option<u32>;

    /// Delivers a signal. A process that already vanished is not an error.
    fn signal(&mut self, signal: Signal) -> Result<(), NodeError>;

    /// Waits for the process to exit, up to `timeout`.
    ///
    /// Returns [`NodeError::ExitTimeout`] if the process is still alive afterwards.
    fn wait(&mut self, timeout: Duration) -> impl Future<Output = Result<(), NodeError>> + Send;

    /// `host:port` of the P2P listener the process was configured with.
    fn p2p_url(&self) -> String;

    fn set_rpc_config(&mut self, config: RpcConfig);

    fn set_p2p_config(&mut self, config: P2pConfig);

    fn set_electrum_config(&mut self, config: ElectrumConfig);

    fn set_extra_args(&mut self, args: Vec<String>);
}

// ─── DynDaemon Trait ─────────────────────────────────────────────────

/// dyn-compatible counterpart of [`Daemon`].
///
/// `Daemon` uses RPITIT so `dyn Daemon` is not possible; this trait returns
/// [`BoxFuture`] so nodes can hold `Box<dyn DynDaemon>`.
pub trait DynDaemon: Send + Sync {
    fn variant(&self) -> NodeVariant;
    fn start(&mut self) -> BoxFuture<'_, Result<(), NodeError>>;
    fn is_running(&mut self) -> bool;
    fn pid(&self) -> Option<u32>;
    fn signal(&mut self, signal: Signal) -> Result<(), NodeError>;
    fn wait(&mut self, timeout: Duration) -> BoxFuture<'_, Result<(), NodeError>>;
    fn p2p_url(&self) -> String;
    fn set_rpc_config(&mut self, config: RpcConfig);
    fn set_p2p_config(&mut self, config: P2pConfig);
    fn set_electrum_config(&mut self, config: ElectrumConfig);
    fn set_extra_args(&mut self, args: Vec<String>);
}

impl<T: Daemon> DynDaemon for T {
    fn variant(&self) -> NodeVariant {
        Daemon::variant(self)
    }

    fn start(&mut self) -> BoxFuture<'_, Result<(), NodeError>> {
        Box::pin(Daemon::start(self))
    }

    fn is_running(&mut self) -> bool {
        Daemon::is_running(self)
    }

    fn pid(&self) -> Option<u32> {
        Daemon::pid(self)
    }

    fn signal(&mut self, signal: Signal) -> Result<(), NodeError> {
        Daemon::signal(self, signal)
    }

    fn wait(&mut self, timeout: Duration) -> BoxFuture<'_, Result<(), NodeError>> {
        Box::pin(Daemon::wait(self, timeout))
    }

    fn p2p_url(&self) -> String {
        Daemon::p2p_url(self)
    }

    fn set_rpc_config(&mut self, config: RpcConfig) {
        Daemon::set_rpc_config(self, config)
    }

    fn set_p2p_config(&mut self, config: P2pConfig) {
        Daemon::set_p2p_config(self, config)
    }

    fn set_electrum_config(&mut self, config: ElectrumConfig) {
        Daemon::set_electrum_config(self, config)
    }

    fn set_extra_args(&mut self, args: Vec<String>) {
        Daemon::set_extra_args(self, args)
    }
}

// ─── ProcessDaemon ───────────────────────────────────────────────────

/// Spawns the real node binary from `{binaries_dir}/{variant}`.
///
/// stdout and stderr are appended to `{data_dir}/{variant}.log`. The child is
/// killed if the handle is dropped while the process is still running.
pub struct ProcessDaemon {
    spec: LaunchSpec,
    child: Option<Child>,
    last_pid: Option<u32>,
}

impl ProcessDaemon {
    pub fn new(spec: LaunchSpec) -> Self {
        Self {
            spec,
            child: None,
            last_pid: None,
        }
    }

    /// Current launch specification.
    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    fn log_stdio(&self) -> Result<(Stdio, Stdio), NodeError> {
        std::fs::create_dir_all(&self.spec.data_dir)?;
        let path = self
            .spec
            .data_dir
            .join(format!("{}.log", self.spec.variant.binary_name()));
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let stderr = file.try_clone()?;
        Ok((Stdio::from(file), Stdio::from(stderr)))
    }
}

impl Daemon for ProcessDaemon {
    fn variant(&self) -> NodeVariant {
        self.spec.variant
    }

    async fn start(&mut self) -> Result<(), NodeError> {
        if Daemon::is_running(self) {
            return Err(NodeError::AlreadyRunning {
                name: self.spec.variant.to_string(),
            });
        }

        let binary = self.spec.binary_path();
        let args = self.spec.args();
        let (stdout, stderr) = self.log_stdio()?;

        debug!(binary = %binary.display(), ?args, "spawning node process");
        let child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| NodeError::Spawn {
                binary: binary.display().to_string(),
                source,
            })?;

        self.last_pid = child.id();
        info!(
            variant = %self.spec.variant,
            pid = ?self.last_pid,
            rpc_port = self.spec.endpoints.rpc.port,
            p2p_port = self.spec.endpoints.p2p.port,
            "node process spawned"
        );
        self.child = Some(child);
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(variant = %self.spec.variant, %status, "node process has exited");
                false
            }
            Err(e) => {
                warn!(variant = %self.spec.variant, error = %e, "failed to poll node process");
                false
            }
        }
    }

    fn pid(&self) -> Option<u32> {
        self.last_pid
    }

    fn signal(&mut self, signal: Signal) -> Result<(), NodeError> {
        let Some(pid) = self.last_pid else {
            return Ok(());
        };
        if !Daemon::is_running(self) {
            return Ok(());
        }
        send_signal(pid, signal)?;
        info!(variant = %self.spec.variant, pid, %signal, "signal sent to node process");
        Ok(())
    }

    async fn wait(&mut self, timeout: Duration) -> Result<(), NodeError> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(variant = %self.spec.variant, %status, "node process exited");
                self.child = None;
                Ok(())
            }
            Ok(Err(e)) => Err(NodeError::Io(e)),
            Err(_) => Err(NodeError::ExitTimeout {
                pid: self.last_pid.unwrap_or_default(),
                timeout,
            }),
        }
    }

    fn p2p_url(&self) -> String {
        self.spec.endpoints.p2p.url()
    }

    fn set_rpc_config(&mut self, config: RpcConfig) {
        self.spec.endpoints.rpc = config;
    }

    fn set_p2p_config(&mut self, config: P2pConfig) {
        self.spec.endpoints.p2p = config;
    }

    fn set_electrum_config(&mut self, config: ElectrumConfig) {
        self.spec.endpoints.electrum = config;
    }

    fn set_extra_args(&mut self, args: Vec<String>) {
        self.spec.extra_args = args;
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) -> Result<(), NodeError> {
    let sig = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: kill(2) has no memory-safety preconditions; pid was obtained from a child we spawned.
    let ret = unsafe { libc::kill(pid as libc::pid_t, sig) };
    if ret == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        debug!(pid, %signal, "process already gone");
        return Ok(());
    }
    Err(NodeError::Signal {
        pid,
        signal,
        reason: err.to_string(),
    })
}

#[cfg(not(unix))]
fn send_signal(pid: u32, signal: Signal) -> Result<(), NodeError> {
    Err(NodeError::Signal {
        pid,
        signal,
        reason: "signals are only supported on unix".to_owned(),
    })
}
