mod common;

use std::time::Duration;

use crawlmaster::common::node::{Node, NodeStatus};
use crawlmaster::traits::node_store::NodeStore;
use crawlmaster::MasterService;

const INTERVAL: Duration = Duration::from_secs(60);

#[tokio::test]
async fn unregistered_peer_is_rejected() {
    let config = common::master_config("m1", INTERVAL);
    let master = MasterService::new(config).await.unwrap();
    let handle = common::spawn_master(&master).await;
    let addr = master.get_server().local_addr().unwrap();

    let mut ghost = common::TestWorker::connect(addr, "ghost").await.unwrap();
    assert!(ghost.closed_by_server(Duration::from_secs(2)).await);
    assert!(master.get_server().get_subscribe("ghost").is_err());

    master.stop().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn reconnect_replaces_and_closes_the_first_stream() {
    let config = common::master_config("m1", INTERVAL);
    let master = MasterService::new(config).await.unwrap();

    let registry = master.registry();
    let mut w1 = Node::new("w1", "", false);
    w1.status = NodeStatus::Online;
    registry.add_node(&w1).await.unwrap();

    let handle = common::spawn_master(&master).await;
    let addr = master.get_server().local_addr().unwrap();

    let mut first = common::TestWorker::connect(addr, "w1").await.unwrap();
    {
        let master = master.clone();
        common::wait_for(Duration::from_secs(2), move || {
            let master = master.clone();
            async move { master.get_server().get_subscribe("w1").is_ok() }
        })
        .await;
    }
    let first_sub = master.get_server().get_subscribe("w1").unwrap();

    let _second = common::TestWorker::connect(addr, "w1").await.unwrap();
    {
        let master = master.clone();
        let first_id = first_sub.id();
        common::wait_for(Duration::from_secs(2), move || {
            let master = master.clone();
            async move {
                master
                    .get_server()
                    .get_subscribe("w1")
                    .map(|sub| sub.id() != first_id)
                    .unwrap_or(false)
            }
        })
        .await;
    }

    // exactly one live entry; the first transport is closed by the server
    assert_eq!(master.get_server().subscriptions().len(), 1);
    assert!(first.closed_by_server(Duration::from_secs(2)).await);

    master.stop().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn disconnect_tears_down_subscription_and_marks_offline() {
    let config = common::master_config("m1", Duration::from_millis(100));
    let master = MasterService::new(config).await.unwrap();

    let registry = master.registry();
    let mut w1 = Node::new("w1", "", false);
    w1.status = NodeStatus::Online;
    registry.add_node(&w1).await.unwrap();

    let handle = common::spawn_master(&master).await;
    let addr = master.get_server().local_addr().unwrap();

    let worker = common::TestWorker::connect(addr, "w1").await.unwrap();
    {
        let master = master.clone();
        common::wait_for(Duration::from_secs(2), move || {
            let master = master.clone();
            async move { master.get_server().get_subscribe("w1").is_ok() }
        })
        .await;
    }

    drop(worker);
    {
        let master = master.clone();
        let registry = registry.clone();
        common::wait_for(Duration::from_secs(3), move || {
            let master = master.clone();
            let registry = registry.clone();
            async move {
                master.get_server().get_subscribe("w1").is_err()
                    && registry
                        .get_node_by_key("w1")
                        .await
                        .map(|n| n.status == NodeStatus::Offline)
                        .unwrap_or(false)
            }
        })
        .await;
    }

    master.stop().await.unwrap();
    handle.await.unwrap().unwrap();
}
