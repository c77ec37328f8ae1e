use std::fmt;

use serde::Serialize;
use thiserror::Error;

use synod_common::ProposalNum;
use synod_net::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    /// Phase 1: PREPARE / PROMISE
    Prepare,
    /// Phase 2: ACCEPT / ACCEPTED
    Accept,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Prepare => f.write_str("phase 1 (prepare)"),
            Phase::Accept => f.write_str("phase 2 (accept)"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("{phase} timed out for proposal {proposal}: {responses}/{quorum} responses, {nacks} nacks")]
    QuorumTimeout {
        phase: Phase,
        proposal: ProposalNum,
        responses: usize,
        quorum: usize,
        nacks: usize,
    },

    #[error("Value too large: a message carrying it encodes to {size} bytes, limit is {limit}")]
    ValueTooLarge { size: usize, limit: usize },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ConsensusError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ConsensusError::QuorumTimeout { .. })
    }

    /// A fresh proposal number cannot fix this error.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ConsensusError::ValueTooLarge { .. })
    }
}
