//! In-process network used by the cluster simulations.
//!
//! Every node gets an [`InMemoryNetwork`] attached to a shared
//! [`InMemoryHub`]. Messages still go through the JSON codec, and the hub can
//! drop traffic between chosen addresses to simulate partitions.

use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    sync::{mpsc, oneshot, Mutex, RwLock},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, trace, warn};

use synod_common::{ClusterConfig, ConfigError, Message};

use crate::{
    error::TransportError,
    ports::{MessageHandler, Network},
    MAX_DATAGRAM,
};

/// Raw payload plus the address it came from.
type Datagram = (Vec<u8>, SocketAddr);

#[derive(Default)]
struct HubInner {
    endpoints: RwLock<HashMap<SocketAddr, mpsc::UnboundedSender<Datagram>>>,
    blocked: RwLock<HashSet<(SocketAddr, SocketAddr)>>,
    isolated: RwLock<HashSet<SocketAddr>>,
    dropped: AtomicU64,
}

#[derive(Clone, Default)]
pub struct InMemoryHub {
    inner: Arc<HubInner>,
}

impl InMemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the endpoint for the local node of `config`.
    pub fn network(&self, config: &ClusterConfig) -> Result<InMemoryNetwork, ConfigError> {
        Ok(InMemoryNetwork {
            hub: self.clone(),
            local: config.local_address()?,
            peers: config.peer_addresses(),
            join_timeout: config.shutdown_join_timeout(),
            running: Mutex::new(None),
        })
    }

    /// Drops everything sent from `from` to `to`. One direction only.
    pub async fn block(&self, from: SocketAddr, to: SocketAddr) {
        self.inner.blocked.write().await.insert((from, to));
    }

    /// Cuts every link between the two groups, in both directions.
    pub async fn partition(&self, left: &[SocketAddr], right: &[SocketAddr]) {
        let mut blocked = self.inner.blocked.write().await;
        for a in left {
            for b in right {
                blocked.insert((*a, *b));
                blocked.insert((*b, *a));
            }
        }
    }

    /// Cuts a node off from everyone else.
    pub async fn isolate(&self, node: SocketAddr) {
        self.inner.isolated.write().await.insert(node);
    }

    /// Restores every link.
    pub async fn heal(&self) {
        self.inner.blocked.write().await.clear();
        self.inner.isolated.write().await.clear();
    }

    /// Datagrams lost to partitions or missing endpoints so far.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Delivers raw bytes as if they had arrived from `from`, bypassing the codec.
    pub async fn inject(&self, bytes: Vec<u8>, from: SocketAddr, to: SocketAddr) {
        self.deliver(bytes, from, to).await;
    }

    async fn link_up(&self, from: SocketAddr, to: SocketAddr) -> bool {
        {
            let isolated = self.inner.isolated.read().await;
            if isolated.contains(&from) || isolated.contains(&to) {
                return false;
            }
        }
        !self.inner.blocked.read().await.contains(&(from, to))
    }

    /// Like a UDP send, a lost datagram is not an error for the sender.
    async fn deliver(&self, bytes: Vec<u8>, from: SocketAddr, to: SocketAddr) {
        if from != to && !self.link_up(from, to).await {
            trace!("Link {} -> {} is down, dropping datagram", from, to);
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let endpoint = self.inner.endpoints.read().await.get(&to).cloned();
        let delivered = endpoint.map(|tx| tx.send((bytes, from)).is_ok()).unwrap_or(false);
        if !delivered {
            trace!("No endpoint listening on {}", to);
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn register(&self, addr: SocketAddr, tx: mpsc::UnboundedSender<Datagram>) {
        self.inner.endpoints.write().await.insert(addr, tx);
    }

    async fn unregister(&self, addr: SocketAddr) {
        self.inner.endpoints.write().await.remove(&addr);
    }
}

pub struct InMemoryNetwork {
    hub: InMemoryHub,
    local: SocketAddr,
    peers: Vec<SocketAddr>,
    join_timeout: Duration,
    running: Mutex<Option<Running>>,
}

struct Running {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl InMemoryNetwork {
    async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}

async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<Datagram>,
    local: SocketAddr,
    handler: Arc<dyn MessageHandler>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            received = rx.recv() => {
                let Some((bytes, src)) = received else { break };
                if bytes.len() > MAX_DATAGRAM {
                    warn!("⚠️ Oversized datagram from {} ({} bytes), dropping", src, bytes.len());
                    continue;
                }
                if src == local {
                    continue;
                }

                let message = match Message::decode(&bytes) {
                    Ok(message) => message,
                    Err(source) => {
                        warn!("{}", TransportError::Deserialization { from: src, source });
                        continue;
                    }
                };
                if message.sender == local {
                    continue;
                }

                debug!(
                    "📥 RECV from {}: {} (prop#{})",
                    message.sender, message.kind, message.proposal_num
                );
                let from = message.sender;
                handler.handle_message(message, from).await;
            }
        }
    }
}

#[async_trait]
impl Network for InMemoryNetwork {
    fn local_addr(&self) -> SocketAddr {
        self.local
    }

    async fn start(&self, handler: Arc<dyn MessageHandler>) -> Result<(), TransportError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(TransportError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.hub.register(self.local, tx).await;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(dispatch_loop(rx, self.local, handler, shutdown_rx));
        *running = Some(Running { shutdown: shutdown_tx, task });
        Ok(())
    }

    async fn stop(&self) {
        let Some(Running { shutdown, mut task }) = self.running.lock().await.take() else {
            return;
        };

        self.hub.unregister(self.local).await;
        let _ = shutdown.send(());
        if timeout(self.join_timeout, &mut task).await.is_err() {
            warn!("⚠️ Dispatch loop for {} did not finish, aborting", self.local);
            task.abort();
            let _ = task.await;
        }
    }

    async fn send_to(&self, message: &Message, target: SocketAddr) -> bool {
        if !self.is_running().await {
            warn!("⚠️ Network for {} not started, dropping {}", self.local, message.kind);
            return false;
        }

        match message.encode() {
            Ok(bytes) if bytes.len() > MAX_DATAGRAM => {
                let err = TransportError::Send {
                    target,
                    reason: format!("{} of {} bytes exceeds the {} byte datagram limit", message.kind, bytes.len(), MAX_DATAGRAM),
                };
                warn!("❌ {}", err);
                false
            }
            Ok(bytes) => {
                debug!("📤 SEND to {}: {} (prop#{})", target, message.kind, message.proposal_num);
                self.hub.deliver(bytes, self.local, target).await;
                true
            }
            Err(e) => {
                warn!("{}", TransportError::Serialization(e));
                false
            }
        }
    }

    async fn broadcast(&self, message: &Message, exclude_self: bool) -> usize {
        let mut sent = 0;
        for target in &self.peers {
            if exclude_self && *target == self.local {
                continue;
            }
            if self.send_to(message, *target).await {
                sent += 1;
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synod_common::{MessageType, NodeId, PeerEntry};

    struct Collect(mpsc::UnboundedSender<Message>);

    #[async_trait]
    impl MessageHandler for Collect {
        async fn handle_message(&self, message: Message, _from: SocketAddr) {
            let _ = self.0.send(message);
        }
    }

    fn addr(i: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 9000 + i))
    }

    fn config(n: u16, local: u16) -> ClusterConfig {
        let peers = (0..n)
            .map(|i| PeerEntry {
                name: NodeId(format!("n{}", i)),
                address: addr(i),
                node_id: i as u8,
            })
            .collect();
        ClusterConfig::new(format!("n{}", local), peers).unwrap()
    }

    async fn spawn(hub: &InMemoryHub, n: u16, local: u16) -> (InMemoryNetwork, mpsc::UnboundedReceiver<Message>) {
        let net = hub.network(&config(n, local)).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        net.start(Arc::new(Collect(tx))).await.unwrap();
        (net, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Message>) -> Option<Message> {
        timeout(Duration::from_millis(200), rx.recv()).await.ok().flatten()
    }

    #[tokio::test]
    async fn test_broadcast_reaches_peers_but_not_self() {
        let hub = InMemoryHub::new();
        let (a, mut rx_a) = spawn(&hub, 3, 0).await;
        let (_b, mut rx_b) = spawn(&hub, 3, 1).await;
        let (_c, mut rx_c) = spawn(&hub, 3, 2).await;

        assert_eq!(a.broadcast(&Message::prepare(100, addr(0)), false).await, 3);

        assert_eq!(next(&mut rx_b).await.unwrap().kind, MessageType::Prepare);
        assert_eq!(next(&mut rx_c).await.unwrap().kind, MessageType::Prepare);
        assert!(next(&mut rx_a).await.is_none());
    }

    #[tokio::test]
    async fn test_partition_and_heal() {
        let hub = InMemoryHub::new();
        let (a, _rx_a) = spawn(&hub, 3, 0).await;
        let (_b, mut rx_b) = spawn(&hub, 3, 1).await;
        let (_c, mut rx_c) = spawn(&hub, 3, 2).await;

        hub.partition(&[addr(0)], &[addr(1)]).await;
        a.broadcast(&Message::prepare(1, addr(0)), true).await;
        assert!(next(&mut rx_b).await.is_none());
        assert_eq!(next(&mut rx_c).await.unwrap().proposal_num, 1);
        assert_eq!(hub.dropped(), 1);

        hub.heal().await;
        a.broadcast(&Message::prepare(2, addr(0)), true).await;
        assert_eq!(next(&mut rx_b).await.unwrap().proposal_num, 2);
        assert_eq!(next(&mut rx_c).await.unwrap().proposal_num, 2);
    }

    #[tokio::test]
    async fn test_isolate_cuts_both_directions() {
        let hub = InMemoryHub::new();
        let (a, mut rx_a) = spawn(&hub, 2, 0).await;
        let (b, mut rx_b) = spawn(&hub, 2, 1).await;

        hub.isolate(addr(1)).await;
        assert!(a.send_to(&Message::prepare(1, addr(0)), addr(1)).await);
        assert!(b.send_to(&Message::nack(1, addr(1)), addr(0)).await);
        assert!(next(&mut rx_a).await.is_none());
        assert!(next(&mut rx_b).await.is_none());
    }

    #[tokio::test]
    async fn test_block_is_one_way() {
        let hub = InMemoryHub::new();
        let (a, mut rx_a) = spawn(&hub, 2, 0).await;
        let (b, mut rx_b) = spawn(&hub, 2, 1).await;

        hub.block(addr(0), addr(1)).await;
        assert!(a.send_to(&Message::prepare(1, addr(0)), addr(1)).await);
        assert!(next(&mut rx_b).await.is_none());
        assert_eq!(hub.dropped(), 1);

        assert!(b.send_to(&Message::nack(1, addr(1)), addr(0)).await);
        assert_eq!(next(&mut rx_a).await.unwrap().kind, MessageType::Nack);
    }

    #[tokio::test]
    async fn test_oversized_message_is_refused_by_sender() {
        let hub = InMemoryHub::new();
        let (a, _rx_a) = spawn(&hub, 2, 0).await;
        let (_b, mut rx_b) = spawn(&hub, 2, 1).await;

        let big = Message::accept(9, serde_json::json!("x".repeat(MAX_DATAGRAM)), addr(0));
        assert!(!a.send_to(&big, addr(1)).await);
        assert_eq!(a.broadcast(&big, true).await, 0);
        assert!(next(&mut rx_b).await.is_none());
        // refused before reaching the hub, so nothing counts as dropped in transit
        assert_eq!(hub.dropped(), 0);
    }

    #[tokio::test]
    async fn test_garbage_is_dropped_and_loop_survives() {
        let hub = InMemoryHub::new();
        let (_b, mut rx_b) = spawn(&hub, 2, 1).await;

        hub.inject(b"garbage".to_vec(), addr(0), addr(1)).await;
        let valid = Message::learn(3, serde_json::json!("v"), addr(0)).encode().unwrap();
        hub.inject(valid, addr(0), addr(1)).await;

        let msg = next(&mut rx_b).await.unwrap();
        assert_eq!(msg.kind, MessageType::Learn);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_unregisters() {
        let hub = InMemoryHub::new();
        let (a, _rx_a) = spawn(&hub, 2, 0).await;
        let (b, mut rx_b) = spawn(&hub, 2, 1).await;

        b.stop().await;
        b.stop().await;

        assert!(a.send_to(&Message::prepare(1, addr(0)), addr(1)).await);
        assert!(next(&mut rx_b).await.is_none());
        assert!(!b.send_to(&Message::prepare(1, addr(1)), addr(0)).await);

        // restart after stop is allowed
        let (tx, _rx) = mpsc::unbounded_channel();
        b.start(Arc::new(Collect(tx))).await.unwrap();
    }
}
