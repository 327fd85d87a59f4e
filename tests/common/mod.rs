#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use uuid::Uuid;

use crawlmaster::common::config::{MasterConfig, StorageType};
use crawlmaster::common::message::StreamMessage;
use crawlmaster::{MasterService, ServiceState};

pub fn temp_path(prefix: &str) -> String {
    std::env::temp_dir()
        .join(format!("{}-{}.json", prefix, Uuid::new_v4().simple()))
        .to_str()
        .unwrap()
        .to_string()
}

/// Node config file plus a master config bound to an ephemeral port with a
/// fresh file-backed registry.
pub fn master_config(node_key: &str, monitor_interval: Duration) -> MasterConfig {
    let config_path = temp_path("node-config");
    std::fs::write(&config_path, format!(r#"{{"key":"{}"}}"#, node_key)).unwrap();
    MasterConfig {
        config_path,
        host: "127.0.0.1".to_string(),
        port: 0,
        monitor_interval,
        stop_on_error: false,
        node_store_type: StorageType::File,
        node_store_file_path: temp_path("nodes"),
        node_store_redis_urls: None,
    }
}

/// Spawn `start()` in the background and wait for the service to come up.
pub async fn spawn_master(master: &Arc<MasterService>) -> tokio::task::JoinHandle<Result<()>> {
    let svc = master.clone();
    let handle = tokio::spawn(async move { svc.start().await });
    let master = master.clone();
    wait_for(Duration::from_secs(5), move || {
        let master = master.clone();
        async move { master.state() == ServiceState::Running }
    })
    .await;
    handle
}

pub async fn wait_for<F, Fut>(timeout: Duration, cond: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {:?}",
            timeout
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Minimal framed worker client speaking the node stream protocol.
pub struct TestWorker {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl TestWorker {
    pub async fn connect(addr: SocketAddr, node_key: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let mut builder = tokio_util::codec::length_delimited::Builder::new();
        builder.length_field_length(4);
        let mut framed = Framed::new(stream, builder.new_codec());
        framed
            .send(StreamMessage::register(node_key).encode()?)
            .await?;
        Ok(Self { framed })
    }

    /// Next message from the master; None when the stream closed or the
    /// timeout elapsed.
    pub async fn recv(&mut self, timeout: Duration) -> Option<StreamMessage> {
        match tokio::time::timeout(timeout, self.framed.next()).await {
            Ok(Some(Ok(frame))) => StreamMessage::decode(&frame).ok(),
            _ => None,
        }
    }

    /// True only when the server closed the stream (clean EOF) before the
    /// timeout.
    pub async fn closed_by_server(&mut self, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, self.framed.next()).await,
            Ok(None)
        )
    }

    pub async fn send(&mut self, msg: StreamMessage) -> Result<()> {
        self.framed.send(msg.encode()?).await?;
        Ok(())
    }
}
