//! UDP transport.
//!
//! One socket receives on the node's configured address, a second one sends.
//! The receive loop runs as its own task, polls with a bounded timeout and
//! hands every decoded message to the registered [`MessageHandler`].

use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    net::UdpSocket,
    sync::{oneshot, Mutex},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, error, info, trace, warn};

use synod_common::{ClusterConfig, ConfigError, Message};

use crate::{
    error::TransportError,
    ports::{MessageHandler, Network},
    MAX_DATAGRAM,
};

pub struct UdpTransport {
    local: SocketAddr,
    peers: Vec<SocketAddr>,
    poll_interval: Duration,
    join_timeout: Duration,
    running: Mutex<Option<Running>>,
}

struct Running {
    send_socket: Arc<UdpSocket>,
    bound: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl UdpTransport {
    pub fn new(config: &ClusterConfig) -> Result<Self, ConfigError> {
        let local = config.local_address()?;
        info!("Network initialized for {}", local);
        Ok(Self {
            local,
            peers: config.peer_addresses(),
            poll_interval: config.poll_interval(),
            join_timeout: config.shutdown_join_timeout(),
            running: Mutex::new(None),
        })
    }

    /// Address the receive socket actually bound to, while running.
    pub async fn bound_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.bound)
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    async fn send_socket(&self) -> Option<Arc<UdpSocket>> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|r| Arc::clone(&r.send_socket))
    }
}

fn unspecified(addr: &SocketAddr) -> IpAddr {
    match addr {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}

async fn bind_receive(local: SocketAddr) -> Result<UdpSocket, TransportError> {
    match UdpSocket::bind(local).await {
        Ok(socket) => {
            info!("Receive socket bound to {}", local);
            Ok(socket)
        }
        Err(e) => {
            let fallback = SocketAddr::new(unspecified(&local), local.port());
            warn!("⚠️ Could not bind {} ({}), using {}", local, e, fallback);
            UdpSocket::bind(fallback)
                .await
                .map_err(|source| TransportError::Bind { addr: fallback, source })
        }
    }
}

async fn bind_send(local: SocketAddr) -> Result<UdpSocket, TransportError> {
    let preferred = SocketAddr::new(local.ip(), 0);
    match UdpSocket::bind(preferred).await {
        Ok(socket) => Ok(socket),
        Err(_) => {
            let fallback = SocketAddr::new(unspecified(&local), 0);
            UdpSocket::bind(fallback)
                .await
                .map_err(|source| TransportError::Bind { addr: fallback, source })
        }
    }
}

async fn send_datagram(socket: &UdpSocket, message: &Message, target: SocketAddr) -> bool {
    let bytes = match message.encode() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("{}", TransportError::Serialization(e));
            return false;
        }
    };

    if bytes.len() > MAX_DATAGRAM {
        let err = TransportError::Send {
            target,
            reason: format!("{} of {} bytes exceeds the {} byte datagram limit", message.kind, bytes.len(), MAX_DATAGRAM),
        };
        error!("❌ {}", err);
        return false;
    }

    match socket.send_to(&bytes, target).await {
        Ok(_) => {
            debug!("📤 SEND to {}: {} (prop#{})", target, message.kind, message.proposal_num);
            true
        }
        Err(e) => {
            let err = TransportError::Send { target, reason: e.to_string() };
            error!("❌ {}", err);
            false
        }
    }
}

async fn receive_loop(
    socket: UdpSocket,
    local: SocketAddr,
    handler: Arc<dyn MessageHandler>,
    poll_interval: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            polled = timeout(poll_interval, socket.recv_from(&mut buf)) => {
                let (len, src) = match polled {
                    // poll interval elapsed, check for shutdown again
                    Err(_) => continue,
                    Ok(Err(e)) => {
                        error!("Error receiving datagram: {}", e);
                        continue;
                    }
                    Ok(Ok(received)) => received,
                };

                if src == local {
                    continue;
                }

                let message = match Message::decode(&buf[..len]) {
                    Ok(message) => message,
                    Err(source) => {
                        warn!("{}", TransportError::Deserialization { from: src, source });
                        continue;
                    }
                };

                if message.sender == local {
                    trace!("Discarding own {} (prop#{})", message.kind, message.proposal_num);
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

    debug!("Receive loop for {} finished", local);
}

#[async_trait]
impl Network for UdpTransport {
    fn local_addr(&self) -> SocketAddr {
        self.local
    }

    async fn start(&self, handler: Arc<dyn MessageHandler>) -> Result<(), TransportError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(TransportError::AlreadyStarted);
        }

        let recv_socket = bind_receive(self.local).await?;
        let bound = recv_socket.local_addr()?;
        let send_socket = Arc::new(bind_send(self.local).await?);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(receive_loop(
            recv_socket,
            self.local,
            handler,
            self.poll_interval,
            shutdown_rx,
        ));

        *running = Some(Running {
            send_socket,
            bound,
            shutdown: shutdown_tx,
            task,
        });
        info!("✅ Receive loop started on {}", bound);
        Ok(())
    }

    async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            debug!("Transport for {} already stopped", self.local);
            return;
        };

        let Running { send_socket, shutdown, mut task, .. } = running;
        let _ = shutdown.send(());

        if timeout(self.join_timeout, &mut task).await.is_err() {
            warn!("⚠️ Receive loop for {} did not finish in {:?}, aborting", self.local, self.join_timeout);
            task.abort();
            let _ = task.await;
        }

        drop(send_socket);
        info!("Network stopped for {}", self.local);
    }

    async fn send_to(&self, message: &Message, target: SocketAddr) -> bool {
        match self.send_socket().await {
            Some(socket) => send_datagram(&socket, message, target).await,
            None => {
                warn!("⚠️ Transport not started, dropping {} to {}", message.kind, target);
                false
            }
        }
    }

    async fn broadcast(&self, message: &Message, exclude_self: bool) -> usize {
        let Some(socket) = self.send_socket().await else {
            warn!("⚠️ Transport not started, dropping broadcast of {}", message.kind);
            return 0;
        };

        let mut sent = 0;
        for target in &self.peers {
            if exclude_self && *target == self.local {
                continue;
            }
            if send_datagram(&socket, message, *target).await {
                sent += 1;
            }
        }
        sent
    }
}
