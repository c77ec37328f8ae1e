use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-node counters, updated lock-free from the proposer and the receive loop.
#[derive(Debug, Default)]
pub struct NodeStats {
    proposals_initiated: AtomicU64,
    proposals_accepted: AtomicU64,
    proposals_rejected: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    nacks_received: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub proposals_initiated: u64,
    pub proposals_accepted: u64,
    pub proposals_rejected: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub nacks_received: u64,
}

impl NodeStats {
    pub fn proposal_initiated(&self) {
        self.proposals_initiated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn proposal_accepted(&self) {
        self.proposals_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn proposal_rejected(&self) {
        self.proposals_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_sent(&self, count: u64) {
        self.messages_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn nack_received(&self) {
        self.nacks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            proposals_initiated: self.proposals_initiated.load(Ordering::Relaxed),
            proposals_accepted: self.proposals_accepted.load(Ordering::Relaxed),
            proposals_rejected: self.proposals_rejected.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            nacks_received: self.nacks_received.load(Ordering::Relaxed),
        }
    }
}
