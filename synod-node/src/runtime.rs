use std::{sync::Arc, time::Duration};

use rand::Rng;
use serde_json::Value;
use tracing::{info, warn};

use synod_common::ClusterConfig;
use synod_consensus::{ConsensusError, Decision, PaxosNode};
use synod_net::UdpTransport;

use crate::error::NodeError;

/// Builds a node on a UDP transport and starts its receive loop.
pub async fn start_udp_node(config: ClusterConfig) -> Result<Arc<PaxosNode>, NodeError> {
    let transport = Arc::new(UdpTransport::new(&config)?);
    let node = Arc::new(PaxosNode::new(Arc::new(config), transport)?);
    node.start().await?;
    Ok(node)
}

/// Retries a failed proposal with a fresh proposal number each time.
///
/// Between attempts it sleeps `interval` plus up to half of it again as
/// random jitter, so competing proposers drift apart.
pub async fn propose_with_retry(
    node: &PaxosNode,
    value: Value,
    attempts: u32,
    interval: Duration,
) -> Result<Decision, ConsensusError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match node.try_propose(value.clone()).await {
            Ok(decision) => return Ok(decision),
            Err(e) if attempt >= attempts || e.is_permanent() => return Err(e),
            Err(e) => {
                let jitter_ms = rand::thread_rng().gen_range(0..=interval.as_millis() as u64 / 2);
                let pause = interval + Duration::from_millis(jitter_ms);
                warn!("🔁 Attempt {}/{} failed ({}), retrying in {:?}", attempt, attempts, e, pause);
                tokio::time::sleep(pause).await;
                attempt += 1;
            }
        }
    }
}

pub fn report(decision: &Decision, requested: &Value) {
    if decision.carried_forward {
        info!(
            "✅ Consensus reached on {} (proposal {}), carried forward instead of {}",
            decision.value, decision.proposal, requested
        );
    } else {
        info!("✅ Consensus reached on {} (proposal {})", decision.value, decision.proposal);
    }
}
