use std::{
    collections::HashSet,
    net::{IpAddr, UdpSocket},
    path::Path,
};

use serde_json::{json, Value};
use tracing::{info, warn};

use synod_common::{ClusterConfig, ConfigError};

/// Writes the sample table to `path` unless a file is already there.
/// Returns whether a file was written.
pub fn ensure_config(path: &Path, port: u16) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }

    info!("⚠️ Config not found. Writing sample table to {}...", path.display());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    ClusterConfig::sample(port).save_to_file(path)?;
    info!("✅ Sample config written (port {})", port);
    Ok(true)
}

fn bindable(ip: IpAddr) -> bool {
    UdpSocket::bind((ip, 0)).is_ok()
}

/// First configured IP this host can bind, i.e. one of its own interfaces.
pub fn detect_local_ip(config: &ClusterConfig) -> Option<IpAddr> {
    config.peers.iter().map(|p| p.address.ip()).find(|ip| bindable(*ip))
}

/// Picks the local node: explicit name, then explicit address, then the
/// file's own `local` if its address belongs to this host. Detection only
/// replaces `local` when that address cannot be bound here, which keeps
/// several nodes sharing one host (e.g. all on loopback) distinct.
pub fn select_local(
    config: ClusterConfig,
    node: Option<&str>,
    address: Option<IpAddr>,
) -> Result<ClusterConfig, ConfigError> {
    if let Some(name) = node {
        return config.with_local(name);
    }
    if let Some(ip) = address {
        return config.with_local_address(ip);
    }

    let configured = config.local_address()?.ip();
    if bindable(configured) {
        return Ok(config);
    }

    let candidates: HashSet<IpAddr> = config
        .peers
        .iter()
        .map(|p| p.address.ip())
        .filter(|ip| bindable(*ip))
        .collect();

    match detect_local_ip(&config) {
        Some(ip) => {
            if candidates.len() > 1 {
                warn!(
                    "⚠️ {} configured addresses belong to this host, picking {} (use --node to choose)",
                    candidates.len(),
                    ip
                );
            }
            info!("{} is not a local address, detected {}", configured, ip);
            config.with_local_address(ip)
        }
        None => {
            warn!("⚠️ No configured address belongs to this host, running as {}", config.local);
            Ok(config)
        }
    }
}

/// What `status` prints: the resolved local node and the quorum, without
/// binding any socket.
pub fn config_summary(config: &ClusterConfig) -> Result<Value, ConfigError> {
    let local = config.local_peer()?;
    Ok(json!({
        "local": local.name,
        "node_id": local.node_id,
        "address": local.address,
        "quorum_size": config.quorum_size(),
        "peers": config.peers,
    }))
}
