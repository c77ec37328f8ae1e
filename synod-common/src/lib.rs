pub mod config;
pub mod error;
pub mod message;
pub mod proposal;
pub mod utils;

pub use config::{ClusterConfig, PeerEntry, Timeouts};
pub use error::ConfigError;
pub use message::{Message, MessageType};
pub use proposal::{Clock, ManualClock, ProposalNum, ProposalNumberGenerator, SystemClock};
pub use utils::NodeId;

/// Opaque application value carried by PREPARE/ACCEPT/LEARN messages.
pub use serde_json::Value;
