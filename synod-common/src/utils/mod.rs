//! utils.rs
//!
//! Common types and helper implementations shared across the synod crates.

pub mod node_id;
pub use node_id::NodeId;

pub mod time;
