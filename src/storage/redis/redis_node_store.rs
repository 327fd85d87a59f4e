use crate::common::node::{Node, NodeFilter, NodeStatus};
use crate::common::utils::epoch_millis;
use crate::errors::NodeError;
use crate::storage::redis::redis_client::RedisClient;
use crate::traits::node_store::UnsendNodeStore;

use anyhow::Result;
use uuid::Uuid;

const LOCK_MAX_RETRIES: i64 = 200;
const LOCK_RETRY_DELAY_MS: u64 = 100;
const LOCK_TTL_SECS: i64 = 10;

/// Registry backend keeping one JSON value per node under `node:<key>`.
/// Mutations are guarded by a per-key NX lock so concurrent masters (or a
/// master racing an operator tool) never interleave read-modify-write.
pub struct RedisNodeStore {
    client: RedisClient,
}

impl RedisNodeStore {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    fn node_key(key: &str) -> String {
        format!("node:{}", key)
    }

    fn lock_key(key: &str) -> String {
        format!("lock:node:{}", key)
    }

    async fn with_node_lock<T, F, Fut>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce(RedisClient) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let lock_key = Self::lock_key(key);
        let acquired = self
            .client
            .try_acquire_lock(&lock_key, LOCK_MAX_RETRIES, LOCK_RETRY_DELAY_MS, LOCK_TTL_SECS)
            .await?;
        if !acquired {
            return Err(NodeError::RegistryUnavailable {
                reason: format!("cannot acquire lock: {}", lock_key),
            }
            .into());
        }

        let result = f(self.client.clone()).await;

        if let Err(e) = self.client.unlock_exclusive(&lock_key).await {
            log::warn!("failed to release lock {}: {:#}", lock_key, e);
        }
        result
    }
}

impl UnsendNodeStore for RedisNodeStore {
    async fn get_node_by_key(&self, key: &str) -> Result<Node> {
        let value = self.client.get(&Self::node_key(key)).await?;
        let value = value.ok_or_else(|| {
            anyhow::Error::from(NodeError::NotFound {
                key: key.to_string(),
            })
        })?;
        let node: Node = serde_json::from_str(&value).map_err(NodeError::from)?;
        Ok(node)
    }

    async fn add_node(&self, node: &Node) -> Result<Node> {
        let key = node.key.clone();
        let mut node = node.clone();
        self.with_node_lock(&key, |client| async move {
            let redis_key = Self::node_key(&node.key);
            if client.get(&redis_key).await?.is_some() {
                return Err(NodeError::DuplicateKey {
                    key: node.key.clone(),
                }
                .into());
            }
            node.id = Uuid::new_v4().simple().to_string();
            let value = serde_json::to_string(&node).map_err(NodeError::from)?;
            client.set(&redis_key, &value).await?;
            Ok(node)
        })
        .await
    }

    async fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>> {
        let keys = self.client.keys("node:*").await?;
        let mut nodes = Vec::new();
        for key in keys {
            let value = match self.client.get(&key).await? {
                Some(v) => v,
                None => continue, // expired between KEYS and GET
            };
            match serde_json::from_str::<Node>(&value) {
                Ok(node) => {
                    if filter.matches(&node) {
                        nodes.push(node);
                    }
                }
                Err(e) => log::warn!("skipping undecodable node at {}: {}", key, e),
            }
        }
        Ok(nodes)
    }

    async fn update_node_status(&self, key: &str, status: NodeStatus) -> Result<()> {
        let key = key.to_string();
        let key_owned = key.clone();
        self.with_node_lock(&key, |client| async move {
            let redis_key = Self::node_key(&key_owned);
            let value = client.get(&redis_key).await?.ok_or_else(|| {
                anyhow::Error::from(NodeError::NotFound { key: key_owned.clone() })
            })?;
            let mut node: Node = serde_json::from_str(&value).map_err(NodeError::from)?;

            node.status = status;
            if status == NodeStatus::Online {
                node.active = true;
                node.active_ts = epoch_millis();
            }

            let value = serde_json::to_string(&node).map_err(NodeError::from)?;
            client.set(&redis_key, &value).await?;
            Ok(())
        })
        .await
    }
}
