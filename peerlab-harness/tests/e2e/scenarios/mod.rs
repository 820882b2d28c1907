//! E2E test scenarios.

mod config_env;
mod connection;
mod disconnect;
mod lifecycle;
mod teardown;
