use std::{net::SocketAddr, sync::Arc, time::Duration};

use serde_json::json;
use synod_common::{ClusterConfig, NodeId, PeerEntry, Timeouts};
use synod_consensus::{ConsensusError, PaxosNode};
use synod_net::InMemoryHub;
use synod_node::{config_summary, ensure_config, propose_with_retry, select_local};

fn table(n: usize) -> ClusterConfig {
    let peers = (0..n)
        .map(|i| PeerEntry {
            name: NodeId(format!("n{}", i)),
            address: SocketAddr::from(([127, 0, 0, 1], 9700 + i as u16)),
            node_id: i as u8,
        })
        .collect();
    ClusterConfig::new("n0", peers).unwrap().with_timeouts(Timeouts {
        prepare_ms: 40,
        accept_ms: 40,
        retry_interval_ms: 10,
        ..Timeouts::default()
    })
}

#[test]
fn test_ensure_config_writes_sample_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    assert!(ensure_config(&path, 6000).unwrap());
    let written = ClusterConfig::load_from_file(&path).unwrap();
    assert_eq!(written, ClusterConfig::sample(6000));

    // an existing file is left alone
    table(3).save_to_file(&path).unwrap();
    assert!(!ensure_config(&path, 6000).unwrap());
    assert_eq!(ClusterConfig::load_from_file(&path).unwrap(), table(3));
}

#[test]
fn test_select_local() {
    let by_name = select_local(table(3), Some("n2"), None).unwrap();
    assert_eq!(by_name.local, NodeId::from("n2"));

    let sample = ClusterConfig::sample(5000);
    let by_ip = select_local(sample.clone(), None, Some("10.184.53.242".parse().unwrap())).unwrap();
    assert_eq!(by_ip.local, NodeId::from("node-c"));

    assert!(select_local(sample, Some("node-z"), None).is_err());

    // the file's own local is bindable here, so it is kept even though n0 is too
    let kept = select_local(table(3).with_local("n1").unwrap(), None, None).unwrap();
    assert_eq!(kept.local, NodeId::from("n1"));
    assert_eq!(select_local(table(3), None, None).unwrap().local, NodeId::from("n0"));
}

#[test]
fn test_select_local_detects_when_file_local_is_foreign() {
    // 192.0.2.0/24 is reserved for documentation and never assigned to a host
    let peers = vec![
        PeerEntry {
            name: NodeId::from("remote"),
            address: "192.0.2.1:9800".parse().unwrap(),
            node_id: 0,
        },
        PeerEntry {
            name: NodeId::from("here"),
            address: SocketAddr::from(([127, 0, 0, 1], 9801)),
            node_id: 1,
        },
    ];
    let config = ClusterConfig::new("remote", peers).unwrap();

    let detected = select_local(config, None, None).unwrap();
    assert_eq!(detected.local, NodeId::from("here"));
}

#[test]
fn test_config_summary_reports_local_and_quorum() {
    let summary = config_summary(&table(4).with_local("n2").unwrap()).unwrap();

    assert_eq!(summary["local"], json!("n2"));
    assert_eq!(summary["node_id"], json!(2));
    assert_eq!(summary["address"], json!("127.0.0.1:9702"));
    assert_eq!(summary["quorum_size"], json!(3));
    assert_eq!(summary["peers"].as_array().unwrap().len(), 4);

    // nothing was bound: the address is still free
    std::net::UdpSocket::bind("127.0.0.1:9702").unwrap();
}

#[tokio::test]
async fn test_retry_gives_up_after_attempts() {
    let hub = InMemoryHub::new();
    let config = table(3);
    let network = Arc::new(hub.network(&config).unwrap());
    let node = Arc::new(PaxosNode::new(Arc::new(config), network).unwrap());
    node.start().await.unwrap();

    let result = propose_with_retry(&node, json!("v"), 3, Duration::from_millis(10)).await;
    assert!(result.unwrap_err().is_timeout());

    let stats = node.get_status().await.stats;
    assert_eq!(stats.proposals_initiated, 3);
    assert_eq!(stats.proposals_rejected, 3);

    node.stop().await;
}

#[tokio::test]
async fn test_retry_stops_on_oversized_value() {
    let hub = InMemoryHub::new();
    let config = table(3);
    let network = Arc::new(hub.network(&config).unwrap());
    let node = Arc::new(PaxosNode::new(Arc::new(config), network).unwrap());
    node.start().await.unwrap();

    let result = propose_with_retry(&node, json!("x".repeat(5000)), 5, Duration::from_millis(10)).await;
    assert!(matches!(result, Err(ConsensusError::ValueTooLarge { .. })));
    assert_eq!(node.get_status().await.stats.proposals_initiated, 0);

    node.stop().await;
}

#[tokio::test]
async fn test_retry_succeeds_once_quorum_is_back() {
    let hub = InMemoryHub::new();
    let base = table(3);
    let mut nodes = Vec::new();
    for name in ["n0", "n1", "n2"] {
        let config = base.clone().with_local(name).unwrap();
        let network = Arc::new(hub.network(&config).unwrap());
        let node = Arc::new(PaxosNode::new(Arc::new(config), network).unwrap());
        node.start().await.unwrap();
        nodes.push(node);
    }

    let n0 = SocketAddr::from(([127, 0, 0, 1], 9700));
    hub.isolate(n0).await;
    let healer = {
        let hub = hub.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            hub.heal().await;
        })
    };

    let decision = propose_with_retry(&nodes[0], json!("eventually"), 10, Duration::from_millis(20))
        .await
        .unwrap();
    assert_eq!(decision.value, json!("eventually"));
    assert!(nodes[0].get_status().await.stats.proposals_initiated >= 2);

    healer.await.unwrap();
    for node in &nodes {
        node.stop().await;
    }
}
