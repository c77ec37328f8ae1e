use std::{sync::Arc, time::Duration};

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use synod_common::{Message, MessageType, ProposalNum};
use synod_net::{TransportError, MAX_DATAGRAM};

use crate::{
    collector::QuorumCollector,
    error::{ConsensusError, Phase},
};

use super::PaxosNode;

/// Outcome of a successful proposal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub proposal: ProposalNum,
    /// The value actually agreed, which may not be the one requested.
    pub value: Value,
    /// True when a previously accepted value replaced the requested one.
    pub carried_forward: bool,
}

/// Picks the value for phase 2.
///
/// The promise reporting the highest `accepted_proposal` wins; with no
/// prior acceptance the requested value is used. Returns the chosen value
/// and the accepted proposal it was taken from, if any.
pub fn choose_value(promises: &[Message], requested: Value) -> (Value, Option<ProposalNum>) {
    promises
        .iter()
        .filter_map(|p| match (p.accepted_proposal, &p.accepted_value) {
            (Some(n), Some(v)) => Some((n, v)),
            _ => None,
        })
        .max_by_key(|(n, _)| *n)
        .map(|(n, v)| (v.clone(), Some(n)))
        .unwrap_or((requested, None))
}

impl PaxosNode {
    /// Runs both phases for `value`. Every failure is reported as `false`.
    pub async fn propose(&self, value: Value) -> bool {
        match self.try_propose(value).await {
            Ok(_) => true,
            Err(e) => {
                warn!("❌ Proposal failed: {}", e);
                false
            }
        }
    }

    pub async fn try_propose(&self, value: Value) -> Result<Decision, ConsensusError> {
        if let Err(e) = self.check_value_size(&value) {
            warn!(target: "consensus", "EVENT:PROPOSE_REJECT node={} reason={}", self.name, e);
            return Err(e);
        }

        let proposal = self.numbers.next();
        self.stats.proposal_initiated();
        info!(target: "consensus", "EVENT:PROPOSE node={} proposal={} value={}", self.name, proposal, value);

        let result = self.run_phases(proposal, value).await;
        self.retire(proposal).await;

        match &result {
            Ok(decision) => {
                self.stats.proposal_accepted();
                info!(
                    target: "consensus",
                    "EVENT:DECIDED node={} proposal={} value={} carried_forward={}",
                    self.name, decision.proposal, decision.value, decision.carried_forward
                );
            }
            Err(e) => {
                self.stats.proposal_rejected();
                warn!(target: "consensus", "EVENT:PROPOSE_FAIL node={} proposal={} reason={}", self.name, proposal, e);
            }
        }
        result
    }

    /// Rejects a value whose ACCEPT, or a later PROMISE reporting it, would
    /// not fit in one datagram. Peers drop such datagrams, while the local
    /// acceptor would still record the value and keep reporting it.
    fn check_value_size(&self, value: &Value) -> Result<(), ConsensusError> {
        let widest = self
            .config
            .peer_addresses()
            .into_iter()
            .chain(std::iter::once(self.address))
            .max_by_key(|addr| addr.to_string().len())
            .unwrap_or(self.address);

        let accept = Message::accept(ProposalNum::MAX, value.clone(), widest);
        let promise = Message::promise(ProposalNum::MAX, widest, Some((ProposalNum::MAX, value.clone())));
        let size = accept
            .encode()
            .map_err(TransportError::from)?
            .len()
            .max(promise.encode().map_err(TransportError::from)?.len());

        if size > MAX_DATAGRAM {
            return Err(ConsensusError::ValueTooLarge { size, limit: MAX_DATAGRAM });
        }
        Ok(())
    }

    async fn run_phases(&self, proposal: ProposalNum, requested: Value) -> Result<Decision, ConsensusError> {
        let prepare = Message::prepare(proposal, self.address);
        let promises = self
            .run_phase(Phase::Prepare, prepare, self.config.prepare_timeout())
            .await?;

        let (value, carried_from) = choose_value(&promises, requested);
        if let Some(previous) = carried_from {
            info!("🔁 Carrying forward value {} accepted under #{}", value, previous);
        }

        let accept = Message::accept(proposal, value.clone(), self.address);
        self.run_phase(Phase::Accept, accept, self.config.accept_timeout())
            .await?;

        self.handle_learn(proposal, value.clone(), self.address).await;
        let learn = Message::learn(proposal, value.clone(), self.address);
        let sent = self.network.broadcast(&learn, true).await;
        self.stats.messages_sent(sent as u64);

        Ok(Decision {
            proposal,
            value,
            carried_forward: carried_from.is_some(),
        })
    }

    /// Broadcasts `request`, votes locally and waits for a quorum of replies.
    async fn run_phase(
        &self,
        phase: Phase,
        request: Message,
        wait: Duration,
    ) -> Result<Vec<Message>, ConsensusError> {
        let proposal = request.proposal_num;
        let expected = match phase {
            Phase::Prepare => MessageType::Promise,
            Phase::Accept => MessageType::Accepted,
        };

        let collector = Arc::new(QuorumCollector::new(expected, proposal, self.quorum_size));
        {
            let mut proposer = self.proposer.lock().await;
            proposer.current_proposal = proposal;
            proposer.collector = Some(Arc::clone(&collector));
        }

        let sent = self.network.broadcast(&request, true).await;
        self.stats.messages_sent(sent as u64);
        info!("📤 {}: {} #{} sent to {} peers", phase, request.kind, proposal, sent);

        // local vote, no network round trip
        let local_reply = match request.value.clone() {
            Some(value) if phase == Phase::Accept => Some(self.handle_accept(proposal, value).await),
            None if phase == Phase::Prepare => Some(self.handle_prepare(proposal).await),
            _ => None,
        };
        if let Some(reply) = local_reply {
            self.route_response(&reply, self.address).await;
        }

        if !collector.wait_for_quorum(wait).await {
            return Err(ConsensusError::QuorumTimeout {
                phase,
                proposal,
                responses: collector.response_count().await,
                quorum: self.quorum_size,
                nacks: collector.nacks().await,
            });
        }

        let responses = collector.get_responses().await;
        info!(
            target: "consensus",
            "EVENT:QUORUM node={} phase={:?} proposal={} responses={}",
            self.name, phase, proposal, responses.len()
        );
        Ok(responses)
    }

    /// Drops the collector once its proposal is over, unless a newer one replaced it.
    async fn retire(&self, proposal: ProposalNum) {
        let mut proposer = self.proposer.lock().await;
        if proposer
            .collector
            .as_ref()
            .is_some_and(|c| c.proposal_num() == proposal)
        {
            proposer.collector = None;
        }
    }
}
