use std::{net::SocketAddr, sync::Arc, time::Duration};

use serde_json::json;
use synod_common::{ClusterConfig, NodeId, PeerEntry, Timeouts};
use synod_consensus::{ConsensusError, PaxosNode};
use synod_net::UdpTransport;

fn free_addrs(n: usize) -> Vec<SocketAddr> {
    let sockets: Vec<_> = (0..n)
        .map(|_| std::net::UdpSocket::bind("127.0.0.1:0").unwrap())
        .collect();
    sockets.iter().map(|s| s.local_addr().unwrap()).collect()
}

async fn udp_cluster(addrs: &[SocketAddr]) -> Vec<Arc<PaxosNode>> {
    let peers: Vec<_> = addrs
        .iter()
        .enumerate()
        .map(|(i, a)| PeerEntry {
            name: NodeId(format!("udp-{}", i)),
            address: *a,
            node_id: i as u8,
        })
        .collect();

    let mut nodes = Vec::new();
    for i in 0..addrs.len() {
        let config = ClusterConfig::new(format!("udp-{}", i), peers.clone())
            .unwrap()
            .with_timeouts(Timeouts {
                prepare_ms: 2_000,
                accept_ms: 2_000,
                poll_interval_ms: 50,
                shutdown_join_ms: 500,
                retry_interval_ms: 100,
            });
        let transport = Arc::new(UdpTransport::new(&config).unwrap());
        let node = Arc::new(PaxosNode::new(Arc::new(config), transport).unwrap());
        node.start().await.unwrap();
        nodes.push(node);
    }
    nodes
}

#[tokio::test]
async fn test_udp_cluster_reaches_agreement() {
    let addrs = free_addrs(3);
    let nodes = udp_cluster(&addrs).await;

    assert!(nodes[0].propose(json!({"op": "set", "key": "x", "value": 1})).await);

    let mut learned = Vec::new();
    for _ in 0..100 {
        learned.clear();
        for node in &nodes {
            learned.push(node.learned().await.map(|(_, v)| v));
        }
        if learned.iter().all(Option::is_some) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    for value in &learned {
        assert_eq!(value.as_ref(), Some(&json!({"op": "set", "key": "x", "value": 1})));
    }

    let status = nodes[0].get_status().await;
    assert!(status.stats.messages_sent >= 6);
    assert!(status.stats.messages_received >= 2);

    for node in &nodes {
        node.stop().await;
    }
}

#[tokio::test]
async fn test_udp_majority_survives_one_down_node() {
    let addrs = free_addrs(3);
    let nodes = udp_cluster(&addrs).await;
    nodes[2].stop().await;

    let decision = nodes[1].try_propose(json!("two of three")).await.unwrap();
    assert_eq!(decision.value, json!("two of three"));

    nodes[0].stop().await;
    nodes[1].stop().await;
}

#[tokio::test]
async fn test_udp_oversized_value_does_not_cost_fault_tolerance() {
    let addrs = free_addrs(3);
    let nodes = udp_cluster(&addrs).await;

    let err = nodes[0].try_propose(json!("x".repeat(5000))).await.unwrap_err();
    assert!(matches!(err, ConsensusError::ValueTooLarge { .. }));
    assert_eq!(nodes[0].acceptor_state().await.accepted_value, None);

    nodes[2].stop().await;
    let decision = nodes[1].try_propose(json!("small")).await.unwrap();
    assert_eq!(decision.value, json!("small"));
    assert!(!decision.carried_forward);

    nodes[0].stop().await;
    nodes[1].stop().await;
}
