pub mod error;
pub mod in_memory;
pub mod ports;
pub mod udp;

pub use error::TransportError;
pub use in_memory::{InMemoryHub, InMemoryNetwork};
pub use ports::{MessageHandler, Network};
pub use udp::UdpTransport;

/// Largest datagram the receive loops accept.
pub const MAX_DATAGRAM: usize = 4096;
