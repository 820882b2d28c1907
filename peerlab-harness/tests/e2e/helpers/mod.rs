//! Shared E2E test helpers.
//!
//! Provides a config builder rooted in a temp directory and a harness
//! factory wired to a fresh `MockNetwork`.

pub mod config;
pub mod harness;
