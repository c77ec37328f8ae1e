use serde::Serialize;
use serde_json::Value;

use synod_common::ProposalNum;

#[derive(Debug, Clone, PartialEq)]
pub enum PrepareOutcome {
    /// Promise issued; carries whatever this acceptor had accepted before.
    Promised { accepted: Option<(ProposalNum, Value)> },
    Rejected { promised: ProposalNum },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted,
    Rejected { promised: ProposalNum },
}

/// Acceptor half of a node. Lives only in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AcceptorState {
    pub promised_proposal: ProposalNum,
    pub accepted_proposal: ProposalNum,
    pub accepted_value: Option<Value>,
}

impl AcceptorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// PREPARE needs a number strictly above the current promise.
    pub fn on_prepare(&mut self, proposal: ProposalNum) -> PrepareOutcome {
        if proposal > self.promised_proposal {
            self.promised_proposal = proposal;
            PrepareOutcome::Promised { accepted: self.accepted() }
        } else {
            PrepareOutcome::Rejected { promised: self.promised_proposal }
        }
    }

    /// ACCEPT may reuse the number that was just promised.
    pub fn on_accept(&mut self, proposal: ProposalNum, value: Value) -> AcceptOutcome {
        if proposal >= self.promised_proposal {
            self.promised_proposal = proposal;
            self.accepted_proposal = proposal;
            self.accepted_value = Some(value);
            AcceptOutcome::Accepted
        } else {
            AcceptOutcome::Rejected { promised: self.promised_proposal }
        }
    }

    pub fn accepted(&self) -> Option<(ProposalNum, Value)> {
        self.accepted_value
            .clone()
            .map(|value| (self.accepted_proposal, value))
    }
}
