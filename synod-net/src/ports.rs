use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use synod_common::Message;

use crate::error::TransportError;

/// Receiver of inbound messages.
///
/// Transports call this from their receive loop and await it before reading
/// the next datagram, so messages from one sender are handled in arrival order.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, message: Message, from: SocketAddr);
}

/// Point-to-point and broadcast delivery between the configured peers.
#[async_trait]
pub trait Network: Send + Sync {
    /// Configured address of the local node.
    fn local_addr(&self) -> SocketAddr;

    /// Binds the receive side and starts dispatching to `handler`.
    async fn start(&self, handler: Arc<dyn MessageHandler>) -> Result<(), TransportError>;

    /// Stops the receive loop; no callbacks happen after this returns.
    async fn stop(&self);

    /// Best-effort send. Failures are logged and reported as `false`, never raised.
    async fn send_to(&self, message: &Message, target: SocketAddr) -> bool;

    /// Sends to every configured peer, optionally skipping the local node.
    /// Returns how many sends were handed to the network.
    async fn broadcast(&self, message: &Message, exclude_self: bool) -> usize;
}
