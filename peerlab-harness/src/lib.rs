//! Test harness for florestad, utreexod and bitcoind integration scenarios.
//!
//! A scenario implements [`TestCase`]: it registers nodes in
//! `set_test_params` and drives them in `run_test`. [`run`] wraps both
//! phases, stops every node afterwards and tears them down by signal when
//! anything fails.
//!
//! ```text
//! TestCase ──► run ──► Harness ──► Node ×N ──► florestad | utreexod | bitcoind
//!                        │
//!                        ├─ assertions (stop all on failure)
//!                        └─ wait_for_peers_connections
//! ```

pub mod assertions;
pub mod error;
pub mod harness;
pub mod logging;
pub mod test_case;

pub use error::HarnessError;
pub use harness::Harness;
pub use test_case::{DynTestCase, RunReport, TestCase, run, run_with_backend};
