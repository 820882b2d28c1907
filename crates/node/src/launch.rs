//! Command-line construction for each node variant.
//!
//! Arguments the caller already supplied through `extra_args` take precedence:
//! the data directory flag is only added when the caller did not pass one.

use std::path::{Path, PathBuf};

use peerlab_core::endpoint::EndpointSet;
use peerlab_core::types::NodeVariant;

/// Everything needed to spawn one node process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub variant: NodeVariant,
    pub endpoints: EndpointSet,
    pub extra_args: Vec<String>,
    pub data_dir: PathBuf,
    pub binaries_dir: PathBuf,
}

impl LaunchSpec {
    /// Absolute path of the executable.
    pub fn binary_path(&self) -> PathBuf {
        self.binaries_dir.join(self.variant.binary_name())
    }

    /// Full argument list, extra arguments last.
    pub fn args(&self) -> Vec<String> {
        let mut args = match self.variant {
            NodeVariant::Florestad => florestad_args(self),
            NodeVariant::Utreexod => utreexod_args(self),
            NodeVariant::Bitcoind => bitcoind_args(self),
        };
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// True when any argument starts with `option`.
pub fn is_option_set(args: &[String], option: &str) -> bool {
    args.iter().any(|arg| arg.starts_with(option))
}

/// Port from the first `option=host:port` or `option=port` argument.
pub fn port_from_args(args: &[String], option: &str) -> Option<u16> {
    args.iter()
        .filter_map(|arg| arg.strip_prefix(option))
        .filter_map(|rest| rest.strip_prefix('='))
        .find_map(|value| value.rsplit(':').next()?.parse().ok())
}

const UTREEXOD_ELECTRUM_DISABLED: [&str; 4] = [
    "--noelectrum",
    "--disable-electrum",
    "--electrum=false",
    "--electrum=0",
];

const UTREEXOD_ELECTRUM_LISTENERS: [&str; 2] = ["--electrumlisteners", "--tlselectrumlisteners"];

/// utreexod serves Electrum only when the caller asked for listeners and did
/// not disable the server.
pub fn utreexod_electrum_enabled(extra_args: &[String]) -> bool {
    if UTREEXOD_ELECTRUM_DISABLED
        .iter()
        .any(|opt| is_option_set(extra_args, opt))
    {
        return false;
    }
    UTREEXOD_ELECTRUM_LISTENERS
        .iter()
        .any(|opt| is_option_set(extra_args, opt))
}

fn path_arg(prefix: &str, path: &Path) -> String {
    format!("{prefix}{}", path.display())
}

fn florestad_args(spec: &LaunchSpec) -> Vec<String> {
    let EndpointSet { rpc, electrum, .. } = &spec.endpoints;
    let mut args = vec!["--network".to_owned(), "regtest".to_owned()];
    if !is_option_set(&spec.extra_args, "--data-dir") {
        args.push(path_arg("--data-dir=", &spec.data_dir));
    }
    args.push(format!("--rpc-address={}", rpc.socket_addr()));
    args.push(format!("--electrum-address={}", electrum.address()));
    if let Some(tls) = &electrum.tls {
        args.push("--enable-electrum-tls".to_owned());
        args.push(path_arg("--tls-key-path=", &tls.key_file));
        args.push(path_arg("--tls-cert-path=", &tls.cert_file));
        args.push(format!("--electrum-address-tls={}:{}", electrum.host, tls.port));
    }
    args
}

fn utreexod_args(spec: &LaunchSpec) -> Vec<String> {
    let EndpointSet { rpc, p2p, .. } = &spec.endpoints;
    let mut args = vec!["--regtest".to_owned()];
    if !is_option_set(&spec.extra_args, "--datadir") {
        args.push(path_arg("--datadir=", &spec.data_dir));
    }
    args.push(format!("--rpclisten={}", rpc.socket_addr()));
    if let Some((user, password)) = rpc.credentials() {
        args.push(format!("--rpcuser={user}"));
        args.push(format!("--rpcpass={password}"));
    }
    args.push(format!("--listen={}", p2p.url()));
    args.push("--notls".to_owned());
    args
}

fn bitcoind_args(spec: &LaunchSpec) -> Vec<String> {
    let EndpointSet { rpc, p2p, .. } = &spec.endpoints;
    let mut args = vec!["-regtest".to_owned()];
    if !is_option_set(&spec.extra_args, "-datadir") {
        args.push(path_arg("-datadir=", &spec.data_dir));
    }
    args.push("-server=1".to_owned());
    args.push(format!("-rpcbind={}", rpc.host));
    args.push(format!("-rpcallowip={}", rpc.host));
    args.push(format!("-rpcport={}", rpc.port));
    if let Some((user, password)) = rpc.credentials() {
        args.push(format!("-rpcuser={user}"));
        args.push(format!("-rpcpassword={password}"));
    }
    args.push(format!("-bind={}", p2p.url()));
    args.push(format!("-port={}", p2p.port));
    args.push("-listen=1".to_owned());
    args
}
