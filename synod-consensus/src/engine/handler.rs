use std::net::SocketAddr;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use synod_common::{Message, MessageType, ProposalNum};
use synod_net::MessageHandler;

use crate::{
    acceptor::{AcceptOutcome, PrepareOutcome},
    collector::ResponseOutcome,
};

use super::PaxosNode;

impl PaxosNode {
    /// Acceptor side of PREPARE. Returns the PROMISE or NACK to send back.
    pub(crate) async fn handle_prepare(&self, proposal: ProposalNum) -> Message {
        let outcome = self.acceptor.lock().await.on_prepare(proposal);
        match outcome {
            PrepareOutcome::Promised { accepted } => {
                info!(
                    target: "consensus",
                    "EVENT:PROMISE node={} proposal={} accepted={:?}",
                    self.name,
                    proposal,
                    accepted.as_ref().map(|(n, _)| *n)
                );
                Message::promise(proposal, self.address, accepted)
            }
            PrepareOutcome::Rejected { promised } => {
                warn!("⚠️ NACK PREPARE #{} (already promised #{})", proposal, promised);
                Message::nack(proposal, self.address)
            }
        }
    }

    /// Acceptor side of ACCEPT. Returns the ACCEPTED or NACK to send back.
    pub(crate) async fn handle_accept(&self, proposal: ProposalNum, value: Value) -> Message {
        let outcome = self.acceptor.lock().await.on_accept(proposal, value.clone());
        match outcome {
            AcceptOutcome::Accepted => {
                info!(target: "consensus", "EVENT:ACCEPT node={} proposal={} value={}", self.name, proposal, value);
                Message::accepted(proposal, value, self.address)
            }
            AcceptOutcome::Rejected { promised } => {
                warn!("⚠️ NACK ACCEPT #{} (promised #{})", proposal, promised);
                Message::nack(proposal, self.address)
            }
        }
    }

    pub(crate) async fn handle_learn(&self, proposal: ProposalNum, value: Value, from: SocketAddr) {
        let conflict = self.learner.lock().await.learn(proposal, value.clone());
        if let Some((old_proposal, old_value)) = conflict {
            warn!(
                "🚨 Learned value changed from {} (#{}) to {} (#{})",
                old_value, old_proposal, value, proposal
            );
        }
        info!(
            target: "consensus",
            "EVENT:LEARN node={} proposal={} value={} from={}",
            self.name,
            proposal,
            value,
            self.peer_label(from)
        );
    }

    /// Feeds a phase response into the active collector, if any.
    pub(crate) async fn route_response(&self, message: &Message, from: SocketAddr) {
        if message.kind == MessageType::Nack {
            self.stats.nack_received();
        }

        let collector = self.proposer.lock().await.collector.clone();
        let Some(collector) = collector else {
            debug!("No active proposal, ignoring {} #{}", message.kind, message.proposal_num);
            return;
        };

        match collector.add_response(message, from).await {
            ResponseOutcome::Recorded { count, quorum_reached } => debug!(
                "{} #{} from {} ({}/{}{})",
                message.kind,
                message.proposal_num,
                self.peer_label(from),
                count,
                collector.quorum_size(),
                if quorum_reached { ", quorum" } else { "" }
            ),
            ResponseOutcome::Nack => {
                warn!("⚠️ NACK for #{} from {}", message.proposal_num, self.peer_label(from))
            }
            ResponseOutcome::Duplicate => {
                debug!("Duplicate {} from {}", message.kind, self.peer_label(from))
            }
            ResponseOutcome::Stale | ResponseOutcome::Ignored => debug!(
                "Dropping {} #{} (collector expects {} #{})",
                message.kind,
                message.proposal_num,
                collector.expected(),
                collector.proposal_num()
            ),
        }
    }

    async fn reply(&self, reply: Message, to: SocketAddr) {
        if self.network.send_to(&reply, to).await {
            self.stats.messages_sent(1);
        }
    }
}

#[async_trait]
impl MessageHandler for PaxosNode {
    async fn handle_message(&self, message: Message, from: SocketAddr) {
        self.stats.message_received();

        match message.kind {
            MessageType::Prepare => {
                let reply = self.handle_prepare(message.proposal_num).await;
                self.reply(reply, from).await;
            }
            MessageType::Accept => match message.value {
                Some(value) => {
                    let reply = self.handle_accept(message.proposal_num, value).await;
                    self.reply(reply, from).await;
                }
                None => warn!("⚠️ ACCEPT #{} without a value from {}, dropping", message.proposal_num, from),
            },
            MessageType::Promise | MessageType::Accepted | MessageType::Nack => {
                self.route_response(&message, from).await;
            }
            MessageType::Learn => match message.value {
                Some(value) => self.handle_learn(message.proposal_num, value, from).await,
                None => warn!("⚠️ LEARN #{} without a value from {}, dropping", message.proposal_num, from),
            },
        }
    }
}
