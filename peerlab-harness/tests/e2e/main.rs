//! E2E integration tests for peerlab-harness.
//!
//! These tests drive whole test cases through the harness against the
//! in-memory node backend: registration, retrying startup, peer
//! convergence, assertion teardown and forced cleanup.
//!
//! # Test Structure
//!
//! - `helpers/` -- Shared test utilities (config builder, cases, mock access)
//! - `scenarios/` -- Test files organized by scenario
//!
//! # Running
//!
//! ```bash
//! cargo test -p peerlab-harness --test e2e
//! ```

mod helpers;
mod scenarios;
