use std::{fmt, net::SocketAddr};

use serde::Serialize;

use synod_common::{NodeId, ProposalNum};

use crate::{acceptor::AcceptorState, learner::LearnerState, stats::StatsSnapshot};

/// Point-in-time view of a node, as printed by the `status` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStatus {
    pub name: NodeId,
    pub node_id: u8,
    pub address: SocketAddr,
    pub quorum_size: usize,
    pub current_proposal: ProposalNum,
    pub acceptor: AcceptorState,
    pub learner: LearnerState,
    pub stats: StatsSnapshot,
}

fn show(value: &Option<serde_json::Value>) -> String {
    value.as_ref().map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Node {} (id {}) at {}", self.name, self.node_id, self.address)?;
        writeln!(f, "  quorum size:        {}", self.quorum_size)?;
        writeln!(f, "  current proposal:   {}", self.current_proposal)?;
        writeln!(f, "  promised proposal:  {}", self.acceptor.promised_proposal)?;
        writeln!(f, "  accepted proposal:  {}", self.acceptor.accepted_proposal)?;
        writeln!(f, "  accepted value:     {}", show(&self.acceptor.accepted_value))?;
        writeln!(
            f,
            "  learned:            {} (proposal {})",
            show(&self.learner.learned_value),
            self.learner.learned_proposal.map_or_else(|| "-".to_string(), |n| n.to_string())
        )?;
        write!(
            f,
            "  proposals:          {} initiated, {} accepted, {} rejected\n  messages:           {} sent, {} received, {} nacks",
            self.stats.proposals_initiated,
            self.stats.proposals_accepted,
            self.stats.proposals_rejected,
            self.stats.messages_sent,
            self.stats.messages_received,
            self.stats.nacks_received
        )
    }
}
