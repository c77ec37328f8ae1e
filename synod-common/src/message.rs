//! message.rs
//!
//! Wire message exchanged between Paxos nodes.
//!
//! Every datagram carries exactly one [`Message`] encoded as JSON. Optional
//! fields are omitted when absent, and a present `null` decodes back to
//! `Some(Value::Null)`, so a receiver always sees the exact field set the
//! sender built.

use std::net::SocketAddr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{proposal::ProposalNum, utils::time::utc_timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Phase 1a: proposer -> acceptors
    Prepare,
    /// Phase 1b: acceptor -> proposer
    Promise,
    /// Phase 2a: proposer -> acceptors
    Accept,
    /// Phase 2b: acceptor -> proposer
    Accepted,
    /// Rejection of a stale proposal number
    Nack,
    /// Outcome notification to learners
    Learn,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageType::Prepare => "PREPARE",
            MessageType::Promise => "PROMISE",
            MessageType::Accept => "ACCEPT",
            MessageType::Accepted => "ACCEPTED",
            MessageType::Nack => "NACK",
            MessageType::Learn => "LEARN",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,

    pub proposal_num: ProposalNum,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Configured address of the node that built the message.
    pub sender: SocketAddr,

    /// Informational only, never used for ordering.
    pub timestamp: String,

    /// The proposal number the sender had already accepted, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_proposal: Option<ProposalNum>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub accepted_value: Option<Value>,
}

/// A field that is present on the wire is `Some`, even when it holds `null`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Message {
    pub fn new(kind: MessageType, proposal_num: ProposalNum, value: Option<Value>, sender: SocketAddr) -> Self {
        Self {
            kind,
            proposal_num,
            value,
            sender,
            timestamp: utc_timestamp(),
            accepted_proposal: None,
            accepted_value: None,
        }
    }

    /// Attaches the previously accepted (proposal, value) pair.
    pub fn with_accepted(mut self, accepted: Option<(ProposalNum, Value)>) -> Self {
        if let Some((proposal, value)) = accepted {
            self.accepted_proposal = Some(proposal);
            self.accepted_value = Some(value);
        }
        self
    }

    pub fn prepare(proposal_num: ProposalNum, sender: SocketAddr) -> Self {
        Self::new(MessageType::Prepare, proposal_num, None, sender)
    }

    pub fn promise(
        proposal_num: ProposalNum,
        sender: SocketAddr,
        accepted: Option<(ProposalNum, Value)>,
    ) -> Self {
        Self::new(MessageType::Promise, proposal_num, None, sender).with_accepted(accepted)
    }

    pub fn accept(proposal_num: ProposalNum, value: Value, sender: SocketAddr) -> Self {
        Self::new(MessageType::Accept, proposal_num, Some(value), sender)
    }

    pub fn accepted(proposal_num: ProposalNum, value: Value, sender: SocketAddr) -> Self {
        Self::new(MessageType::Accepted, proposal_num, Some(value), sender)
    }

    pub fn nack(proposal_num: ProposalNum, sender: SocketAddr) -> Self {
        Self::new(MessageType::Nack, proposal_num, None, sender)
    }

    pub fn learn(proposal_num: ProposalNum, value: Value, sender: SocketAddr) -> Self {
        Self::new(MessageType::Learn, proposal_num, Some(value), sender)
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
