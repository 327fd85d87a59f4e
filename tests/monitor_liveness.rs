mod common;

use std::time::Duration;

use crawlmaster::common::message::StreamMessageCode;
use crawlmaster::common::node::{Node, NodeStatus};
use crawlmaster::traits::node_store::NodeStore;
use crawlmaster::MasterService;

const FAST_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::test]
async fn unconnected_worker_goes_offline_within_a_tick() {
    let config = common::master_config("m1", FAST_INTERVAL);
    let master = MasterService::new(config).await.unwrap();

    // pre-populated as online, but never opens a stream
    let registry = master.registry();
    let mut w1 = Node::new("w1", "", false);
    w1.status = NodeStatus::Online;
    registry.add_node(&w1).await.unwrap();

    let handle = common::spawn_master(&master).await;

    tokio::time::sleep(Duration::from_millis(250)).await;
    let row = registry.get_node_by_key("w1").await.unwrap();
    assert_eq!(row.status, NodeStatus::Offline);

    master.stop().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn connected_worker_receives_heartbeats() {
    let config = common::master_config("m1", FAST_INTERVAL);
    let master = MasterService::new(config).await.unwrap();

    let registry = master.registry();
    let mut w1 = Node::new("w1", "", false);
    w1.status = NodeStatus::Online;
    registry.add_node(&w1).await.unwrap();

    let handle = common::spawn_master(&master).await;
    let addr = master.get_server().local_addr().unwrap();
    let mut worker = common::TestWorker::connect(addr, "w1").await.unwrap();
    {
        let master = master.clone();
        common::wait_for(Duration::from_secs(2), move || {
            let master = master.clone();
            async move { master.get_server().get_subscribe("w1").is_ok() }
        })
        .await;
    }

    let ping = worker
        .recv(Duration::from_secs(2))
        .await
        .expect("no heartbeat before timeout");
    assert_eq!(ping.code, StreamMessageCode::Ping);
    assert_eq!(ping.node_key, "m1");

    // PONG is accepted and ignored; the stream stays healthy
    worker
        .send(crawlmaster::common::message::StreamMessage::pong("w1"))
        .await
        .unwrap();
    assert!(worker.recv(Duration::from_secs(2)).await.is_some());

    // a delivered heartbeat proves the transport, not worker status: a row
    // marked online with a live stream is left alone across many ticks
    registry
        .update_node_status("w1", NodeStatus::Online)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;
    let row = registry.get_node_by_key("w1").await.unwrap();
    assert_eq!(row.status, NodeStatus::Online);

    master.stop().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn broken_worker_goes_offline_while_healthy_one_survives() {
    let config = common::master_config("m1", FAST_INTERVAL);
    let master = MasterService::new(config).await.unwrap();

    let registry = master.registry();
    for key in ["w1", "w2"] {
        let mut node = Node::new(key, "", false);
        node.status = NodeStatus::Online;
        registry.add_node(&node).await.unwrap();
    }

    let handle = common::spawn_master(&master).await;
    let addr = master.get_server().local_addr().unwrap();

    let w1 = common::TestWorker::connect(addr, "w1").await.unwrap();
    let mut w2 = common::TestWorker::connect(addr, "w2").await.unwrap();
    {
        let master = master.clone();
        common::wait_for(Duration::from_secs(2), move || {
            let master = master.clone();
            async move {
                master.get_server().get_subscribe("w1").is_ok()
                    && master.get_server().get_subscribe("w2").is_ok()
            }
        })
        .await;
    }

    // ticks before the streams existed may have marked the rows offline;
    // restore them now that both workers are subscribed
    for key in ["w1", "w2"] {
        registry.update_node_status(key, NodeStatus::Online).await.unwrap();
    }

    // kill w1's transport; its subscription tears down and the next tick
    // marks it offline
    drop(w1);
    {
        let registry = registry.clone();
        common::wait_for(Duration::from_secs(3), move || {
            let registry = registry.clone();
            async move {
                registry
                    .get_node_by_key("w1")
                    .await
                    .map(|n| n.status == NodeStatus::Offline)
                    .unwrap_or(false)
            }
        })
        .await;
    }
    assert!(master.get_server().get_subscribe("w1").is_err());

    // w2 is untouched and still being probed
    let row = registry.get_node_by_key("w2").await.unwrap();
    assert_eq!(row.status, NodeStatus::Online);
    assert!(w2.recv(Duration::from_secs(2)).await.is_some());

    master.stop().await.unwrap();
    handle.await.unwrap().unwrap();
}
