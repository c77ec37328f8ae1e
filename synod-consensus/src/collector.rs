//! Aggregation of phase responses for a single proposal.

use std::{collections::HashSet, net::SocketAddr, time::Duration};

use tokio::{
    sync::{watch, Mutex},
    time::timeout,
};
use tracing::debug;

use synod_common::{Message, MessageType, ProposalNum};

/// What `add_response` did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Counted. `quorum_reached` is true only for the response that crossed the threshold.
    Recorded { count: usize, quorum_reached: bool },
    /// Same sender already counted for this proposal.
    Duplicate,
    Nack,
    /// Belongs to another proposal number.
    Stale,
    /// Neither the expected type nor a NACK.
    Ignored,
}

#[derive(Debug, Default)]
struct Responses {
    messages: Vec<Message>,
    senders: HashSet<SocketAddr>,
    nacks: HashSet<SocketAddr>,
}

/// Coletor de respostas de uma fase.
///
/// Created fresh for each (phase, proposal) pair. Responses are filtered by
/// proposal number and deduplicated by sender; the quorum flag flips once
/// and never goes back.
#[derive(Debug)]
pub struct QuorumCollector {
    expected: MessageType,
    proposal_num: ProposalNum,
    quorum_size: usize,
    responses: Mutex<Responses>,
    reached: watch::Sender<bool>,
}

impl QuorumCollector {
    pub fn new(expected: MessageType, proposal_num: ProposalNum, quorum_size: usize) -> Self {
        let (reached, _) = watch::channel(false);
        Self {
            expected,
            proposal_num,
            quorum_size,
            responses: Mutex::new(Responses::default()),
            reached,
        }
    }

    pub fn expected(&self) -> MessageType {
        self.expected
    }

    pub fn proposal_num(&self) -> ProposalNum {
        self.proposal_num
    }

    pub fn quorum_size(&self) -> usize {
        self.quorum_size
    }

    pub async fn add_response(&self, message: &Message, sender: SocketAddr) -> ResponseOutcome {
        if message.proposal_num != self.proposal_num {
            return ResponseOutcome::Stale;
        }

        let mut responses = self.responses.lock().await;

        if message.kind == MessageType::Nack {
            responses.nacks.insert(sender);
            return ResponseOutcome::Nack;
        }
        if message.kind != self.expected {
            return ResponseOutcome::Ignored;
        }
        if !responses.senders.insert(sender) {
            return ResponseOutcome::Duplicate;
        }

        responses.messages.push(message.clone());
        let count = responses.messages.len();

        let quorum_reached = count >= self.quorum_size
            && self.reached.send_if_modified(|reached| {
                let first = !*reached;
                *reached = true;
                first
            });
        if quorum_reached {
            debug!(
                "Quorum of {} {} reached for proposal {}",
                self.quorum_size, self.expected, self.proposal_num
            );
        }

        ResponseOutcome::Recorded { count, quorum_reached }
    }

    /// Suspends until the quorum flag is set or `wait` elapses.
    pub async fn wait_for_quorum(&self, wait: Duration) -> bool {
        let mut rx = self.reached.subscribe();
        let reached = matches!(timeout(wait, rx.wait_for(|reached| *reached)).await, Ok(Ok(_)));
        reached
    }

    pub fn has_quorum(&self) -> bool {
        *self.reached.borrow()
    }

    pub async fn get_responses(&self) -> Vec<Message> {
        self.responses.lock().await.messages.clone()
    }

    pub async fn response_count(&self) -> usize {
        self.responses.lock().await.messages.len()
    }

    pub async fn nacks(&self) -> usize {
        self.responses.lock().await.nacks.len()
    }
}
