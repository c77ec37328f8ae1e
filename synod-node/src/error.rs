use thiserror::Error;

use synod_common::ConfigError;
use synod_consensus::ConsensusError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
