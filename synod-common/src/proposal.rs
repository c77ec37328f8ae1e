//! Proposal numbering.
//!
//! A proposal number is `wallclock_millis * 100 + node_id`: the low two
//! decimal digits always hold the proposer's node id, so two nodes proposing
//! in the same millisecond never collide and the larger node id wins the tie.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::utils::time::current_millis;

pub type ProposalNum = u64;

/// Number of distinct node ids encoded in the low digits.
pub const NODE_ID_SPACE: u64 = 100;

/// Pure construction of a proposal number from a time reading and a node id.
pub fn proposal_number(now_millis: u64, node_id: u8) -> ProposalNum {
    now_millis * NODE_ID_SPACE + u64::from(node_id)
}

/// Node id encoded in the low-order digits of a proposal number.
pub fn node_id_of(proposal: ProposalNum) -> u8 {
    (proposal % NODE_ID_SPACE) as u8
}

/// Source of wall-clock milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        current_millis()
    }
}

/// Manually driven clock for deterministic tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new(millis: u64) -> Self {
        Self { millis: AtomicU64::new(millis) }
    }

    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Hands out proposal numbers for one node.
///
/// Numbers come from the clock, but are never allowed to go backwards or
/// repeat within the lifetime of the generator: when the clock stalls or
/// regresses the previous number is bumped by [`NODE_ID_SPACE`], which keeps
/// the node id in the low digits. Nothing is persisted.
pub struct ProposalNumberGenerator {
    node_id: u8,
    clock: Arc<dyn Clock>,
    last: AtomicU64,
}

impl ProposalNumberGenerator {
    pub fn new(node_id: u8, clock: Arc<dyn Clock>) -> Self {
        Self {
            node_id,
            clock,
            last: AtomicU64::new(0),
        }
    }

    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    pub fn next(&self) -> ProposalNum {
        let candidate = proposal_number(self.clock.now_millis(), self.node_id);
        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let next = if candidate > last { candidate } else { last + NODE_ID_SPACE };
            match self
                .last
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }

    /// Last number handed out, 0 before the first call.
    pub fn last(&self) -> ProposalNum {
        self.last.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ProposalNumberGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProposalNumberGenerator")
            .field("node_id", &self.node_id)
            .field("last", &self.last())
            .finish()
    }
}
