//! peerlab CLI library.
//!
//! Exposes the command handlers and built-in scenarios for integration
//! testing. In production, `peerlab` is used as a binary (main.rs).

pub mod cli;
pub mod commands;
pub mod error;
pub mod metrics_server;
pub mod output;
pub mod scenarios;
