pub mod cli;
pub mod error;
pub mod logging;
pub mod repl;
pub mod runtime;
pub mod setup;

pub use error::NodeError;
pub use runtime::{propose_with_retry, start_udp_node};
pub use setup::{config_summary, ensure_config, select_local};
