//! Built-in scenarios -- one module per case
//!
//! `peerlab run <name>` looks a case up here by its kebab-case name.

pub mod connectivity;
pub mod disconnect_node;
pub mod get_block;
pub mod get_block_header;

use peerlab_harness::DynTestCase;

pub use connectivity::Connectivity;
pub use disconnect_node::DisconnectNode;
pub use get_block::GetBlock;
pub use get_block_header::GetBlockHeader;

/// Every built-in scenario, in listing order.
pub fn builtin() -> Vec<Box<dyn DynTestCase>> {
    vec![
        Box::new(Connectivity),
        Box::new(DisconnectNode),
        Box::new(GetBlock),
        Box::new(GetBlockHeader),
    ]
}

/// Finds a built-in scenario by name.
pub fn find(name: &str) -> Option<Box<dyn DynTestCase>> {
    builtin().into_iter().find(|case| case.name() == name)
}
