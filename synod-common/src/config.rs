use std::{
    collections::HashSet,
    fs,
    net::{IpAddr, SocketAddr},
    path::Path,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, proposal::NODE_ID_SPACE, utils::NodeId};

pub const DEFAULT_PORT: u16 = 5000;

/// One row of the static peer table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub name: NodeId,
    pub address: SocketAddr,
    /// Small unique id (0-99) encoded in this node's proposal numbers.
    pub node_id: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub prepare_ms: u64,
    pub accept_ms: u64,
    /// Upper bound of a single receive poll.
    pub poll_interval_ms: u64,
    /// How long `stop` waits for the receive loop before aborting it.
    pub shutdown_join_ms: u64,
    /// Pause between caller-side retries of a failed proposal.
    pub retry_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            prepare_ms: 5_000,
            accept_ms: 5_000,
            poll_interval_ms: 1_000,
            shutdown_join_ms: 2_000,
            retry_interval_ms: 2_000,
        }
    }
}

/// Static cluster description shared by the transport and the node engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Name of the node this process runs as.
    pub local: NodeId,
    pub peers: Vec<PeerEntry>,
    #[serde(default)]
    pub timeouts: Timeouts,
}

impl ClusterConfig {
    pub fn new(local: impl Into<NodeId>, peers: Vec<PeerEntry>) -> Result<Self, ConfigError> {
        let config = Self {
            local: local.into(),
            peers,
            timeouts: Timeouts::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Four-node table on the shared Paxos port.
    pub fn sample(port: u16) -> Self {
        let peer = |name: &str, ip: [u8; 4], node_id: u8| PeerEntry {
            name: name.into(),
            address: SocketAddr::from((ip, port)),
            node_id,
        };
        Self {
            local: "node-a".into(),
            peers: vec![
                peer("node-a", [10, 184, 53, 33], 33),
                peer("node-b", [10, 184, 53, 27], 27),
                peer("node-c", [10, 184, 53, 242], 42),
                peer("node-d", [10, 184, 53, 252], 52),
            ],
            timeouts: Timeouts::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.peers.is_empty() {
            return Err(ConfigError::Invalid("peer table is empty".to_string()));
        }

        let mut names = HashSet::new();
        let mut addresses = HashSet::new();
        let mut ids = HashSet::new();
        for peer in &self.peers {
            if !names.insert(&peer.name) {
                return Err(ConfigError::Invalid(format!("duplicate node name {}", peer.name)));
            }
            if !addresses.insert(peer.address) {
                return Err(ConfigError::Invalid(format!("duplicate address {}", peer.address)));
            }
            if u64::from(peer.node_id) >= NODE_ID_SPACE {
                return Err(ConfigError::Invalid(format!(
                    "node id {} of {} must be below {}",
                    peer.node_id, peer.name, NODE_ID_SPACE
                )));
            }
            if !ids.insert(peer.node_id) {
                return Err(ConfigError::Invalid(format!("duplicate node id {}", peer.node_id)));
            }
        }

        if !names.contains(&self.local) {
            return Err(ConfigError::UnknownNode(self.local.to_string()));
        }
        Ok(())
    }

    /// Selects the local node by name.
    pub fn with_local(mut self, name: impl Into<NodeId>) -> Result<Self, ConfigError> {
        let name = name.into();
        if !self.peers.iter().any(|p| p.name == name) {
            return Err(ConfigError::UnknownNode(name.to_string()));
        }
        self.local = name;
        Ok(self)
    }

    /// Selects the local node by its IP address.
    pub fn with_local_address(mut self, ip: IpAddr) -> Result<Self, ConfigError> {
        let name = self
            .peers
            .iter()
            .find(|p| p.address.ip() == ip)
            .map(|p| p.name.clone())
            .ok_or_else(|| ConfigError::UnknownNode(ip.to_string()))?;
        self.local = name;
        Ok(self)
    }

    /// Majority threshold over the configured node set: `floor(N/2) + 1`.
    pub fn quorum_size(&self) -> usize {
        self.peers.len() / 2 + 1
    }

    pub fn local_peer(&self) -> Result<&PeerEntry, ConfigError> {
        self.peers
            .iter()
            .find(|p| p.name == self.local)
            .ok_or_else(|| ConfigError::UnknownNode(self.local.to_string()))
    }

    pub fn local_address(&self) -> Result<SocketAddr, ConfigError> {
        self.local_peer().map(|p| p.address)
    }

    pub fn node_id(&self) -> Result<u8, ConfigError> {
        self.local_peer().map(|p| p.node_id)
    }

    pub fn peer_addresses(&self) -> Vec<SocketAddr> {
        self.peers.iter().map(|p| p.address).collect()
    }

    pub fn peer_name(&self, address: SocketAddr) -> Option<&NodeId> {
        self.peers.iter().find(|p| p.address == address).map(|p| &p.name)
    }

    pub fn prepare_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.prepare_ms)
    }

    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.accept_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.timeouts.poll_interval_ms)
    }

    pub fn shutdown_join_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.shutdown_join_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.timeouts.retry_interval_ms)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let parsed = serde_json::from_str::<ClusterConfig>(&data)?;
        parsed.validate()?;
        Ok(parsed)
    }
}
