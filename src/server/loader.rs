use crate::common::config::{MasterConfig, StorageType};
use crate::storage::file::file_node_store::FileNodeStore;
use crate::storage::node_store_impl::NodeStoreImpl;
use crate::storage::redis::redis_client::RedisClient;
use crate::storage::redis::redis_node_store::RedisNodeStore;

use anyhow::Result;
use redis::cluster::ClusterClient;
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn load_node_store(config: &MasterConfig) -> Result<NodeStoreImpl> {
    let store = match config.node_store_type {
        StorageType::File => {
            log::debug!("Using file node store at {}", config.node_store_file_path);
            NodeStoreImpl::File(FileNodeStore::new(&config.node_store_file_path))
        }
        StorageType::Redis => {
            log::debug!("Using Redis node store");
            let redis_urls = config
                .node_store_redis_urls
                .clone()
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .collect::<Vec<String>>();
            if redis_urls.is_empty() || redis_urls[0].is_empty() {
                return Err(anyhow::anyhow!("Redis node store selected but no URLs configured"));
            }
            let redis_client: RedisClient = if redis_urls.len() > 1 {
                log::debug!("Using Redis Cluster with URLs: {:?}", redis_urls);
                let client = ClusterClient::new(redis_urls)?;
                let conn = client.get_async_connection().await?;
                RedisClient::new(true, Some(Arc::new(Mutex::new(conn))), None)
            } else {
                log::debug!("Using single Redis instance at: {}", redis_urls[0]);
                let client = redis::Client::open(redis_urls[0].clone())?;
                let conn = client.get_multiplexed_async_connection().await?;
                RedisClient::new(false, None, Some(Arc::new(Mutex::new(conn))))
            };
            NodeStoreImpl::Redis(RedisNodeStore::new(redis_client))
        }
    };
    Ok(store)
}
