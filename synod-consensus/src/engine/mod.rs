//! Node engine: one Paxos node playing proposer, acceptor and learner.

mod handler;
mod proposer;

use std::{net::SocketAddr, sync::Arc};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use synod_common::{
    Clock, ClusterConfig, ConfigError, NodeId, ProposalNum, ProposalNumberGenerator, SystemClock,
};
use synod_net::{MessageHandler, Network};

use crate::{
    acceptor::AcceptorState,
    collector::QuorumCollector,
    error::ConsensusError,
    learner::LearnerState,
    stats::NodeStats,
    status::NodeStatus,
};

pub use proposer::{choose_value, Decision};

#[derive(Debug, Default)]
struct ProposerState {
    current_proposal: ProposalNum,
    /// At most one live collector; a new phase replaces it.
    collector: Option<Arc<QuorumCollector>>,
}

pub struct PaxosNode {
    config: Arc<ClusterConfig>,
    network: Arc<dyn Network>,
    name: NodeId,
    address: SocketAddr,
    quorum_size: usize,
    numbers: ProposalNumberGenerator,
    acceptor: Mutex<AcceptorState>,
    learner: Mutex<LearnerState>,
    proposer: Mutex<ProposerState>,
    stats: NodeStats,
}

impl PaxosNode {
    pub fn new(config: Arc<ClusterConfig>, network: Arc<dyn Network>) -> Result<Self, ConfigError> {
        Self::with_clock(config, network, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: Arc<ClusterConfig>,
        network: Arc<dyn Network>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let local = config.local_peer()?;
        let name = local.name.clone();
        let address = local.address;
        let numbers = ProposalNumberGenerator::new(local.node_id, clock);
        let quorum_size = config.quorum_size();

        info!(
            "Node {} ({}) ready: {} peers, quorum {}",
            name,
            address,
            config.peers.len(),
            quorum_size
        );

        Ok(Self {
            config,
            network,
            name,
            address,
            quorum_size,
            numbers,
            acceptor: Mutex::new(AcceptorState::new()),
            learner: Mutex::new(LearnerState::new()),
            proposer: Mutex::new(ProposerState::default()),
            stats: NodeStats::default(),
        })
    }

    /// Registers this node as the transport's handler and starts receiving.
    pub async fn start(self: &Arc<Self>) -> Result<(), ConsensusError> {
        let handler: Arc<dyn MessageHandler> = Arc::clone(self) as Arc<dyn MessageHandler>;
        self.network.start(handler).await?;
        info!(target: "consensus", "EVENT:NODE_START node={} addr={}", self.name, self.address);
        Ok(())
    }

    pub async fn stop(&self) {
        self.network.stop().await;
        info!(target: "consensus", "EVENT:NODE_STOP node={}", self.name);
    }

    pub fn name(&self) -> &NodeId {
        &self.name
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn node_id(&self) -> u8 {
        self.numbers.node_id()
    }

    pub fn quorum_size(&self) -> usize {
        self.quorum_size
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub async fn learned(&self) -> Option<(ProposalNum, Value)> {
        self.learner.lock().await.learned()
    }

    pub async fn acceptor_state(&self) -> AcceptorState {
        self.acceptor.lock().await.clone()
    }

    pub async fn get_status(&self) -> NodeStatus {
        let current_proposal = self.proposer.lock().await.current_proposal;
        let acceptor = self.acceptor.lock().await.clone();
        let learner = self.learner.lock().await.clone();

        NodeStatus {
            name: self.name.clone(),
            node_id: self.node_id(),
            address: self.address,
            quorum_size: self.quorum_size,
            current_proposal,
            acceptor,
            learner,
            stats: self.stats.snapshot(),
        }
    }

    fn peer_label(&self, addr: SocketAddr) -> String {
        self.config
            .peer_name(addr)
            .map(|name| name.to_string())
            .unwrap_or_else(|| addr.to_string())
    }
}
