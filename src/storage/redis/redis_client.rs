use redis::aio::MultiplexedConnection;
use redis::cluster_async::ClusterConnection;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::common::utils::jittered_delay;
use crate::errors::NodeError;

/// Thin wrapper over a single or cluster redis connection so the store does
/// not care which deployment it talks to.
#[derive(Clone)]
pub struct RedisClient {
    cluster: bool,
    cluster_conn: Option<Arc<Mutex<ClusterConnection>>>,
    single_conn: Option<Arc<Mutex<MultiplexedConnection>>>,
}

impl RedisClient {
    pub fn new(
        cluster: bool,
        cluster_conn: Option<Arc<Mutex<ClusterConnection>>>,
        single_conn: Option<Arc<Mutex<MultiplexedConnection>>>,
    ) -> Self {
        Self {
            cluster,
            cluster_conn,
            single_conn,
        }
    }

    pub async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        if self.cluster {
            if let Some(conn) = &self.cluster_conn {
                let mut conn = conn.lock().await;
                let value: Option<String> = conn.get(key).await.map_err(NodeError::from)?;
                return Ok(value);
            }
        } else if let Some(conn) = &self.single_conn {
            let mut conn = conn.lock().await;
            let value: Option<String> = conn.get(key).await.map_err(NodeError::from)?;
            return Ok(value);
        }
        Ok(None)
    }

    pub async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if self.cluster {
            if let Some(conn) = &self.cluster_conn {
                let mut conn = conn.lock().await;
                let _: () = conn.set(key, value).await.map_err(NodeError::from)?;
            }
        } else if let Some(conn) = &self.single_conn {
            let mut conn = conn.lock().await;
            let _: () = conn.set(key, value).await.map_err(NodeError::from)?;
        }
        Ok(())
    }

    pub async fn keys(&self, pattern: &str) -> anyhow::Result<Vec<String>> {
        if self.cluster {
            if let Some(conn) = &self.cluster_conn {
                let mut conn = conn.lock().await;
                let keys: Vec<String> = conn.keys(pattern).await.map_err(NodeError::from)?;
                return Ok(keys);
            }
        } else if let Some(conn) = &self.single_conn {
            let mut conn = conn.lock().await;
            let keys: Vec<String> = conn.keys(pattern).await.map_err(NodeError::from)?;
            return Ok(keys);
        }
        Ok(vec![])
    }

    async fn set_nx_with_ttl(&self, key: &str, ttl_secs: i64) -> anyhow::Result<bool> {
        if self.cluster {
            if let Some(conn) = &self.cluster_conn {
                let mut conn = conn.lock().await;
                let acquired: bool = conn.set_nx(key, "lock").await.map_err(NodeError::from)?;
                if acquired {
                    // Expiration avoids a deadlock when the holder dies
                    let _: () = conn.expire(key, ttl_secs).await.map_err(NodeError::from)?;
                }
                return Ok(acquired);
            }
        } else if let Some(conn) = &self.single_conn {
            let mut conn = conn.lock().await;
            let acquired: bool = conn.set_nx(key, "lock").await.map_err(NodeError::from)?;
            if acquired {
                let _: () = conn.expire(key, ttl_secs).await.map_err(NodeError::from)?;
            }
            return Ok(acquired);
        }
        Ok(false)
    }

    pub async fn try_acquire_lock(
        &self,
        lock_key: &str,
        max_retries: i64,
        retry_delay_ms: u64,
        ttl_secs: i64,
    ) -> anyhow::Result<bool> {
        for attempt in 0..max_retries {
            if self.set_nx_with_ttl(lock_key, ttl_secs).await? {
                log::debug!("lock acquired: {} (attempt {})", lock_key, attempt + 1);
                return Ok(true);
            }
            log::debug!(
                "lock busy (attempt {}/{}): {}. Retrying...",
                attempt + 1,
                max_retries,
                lock_key
            );
            sleep(Duration::from_millis(jittered_delay(retry_delay_ms))).await;
        }
        Ok(false)
    }

    pub async fn unlock_exclusive(&self, key: &str) -> anyhow::Result<()> {
        if self.cluster {
            if let Some(conn) = &self.cluster_conn {
                let mut conn = conn.lock().await;
                let _: () = conn.del(key).await.map_err(NodeError::from)?;
            }
        } else if let Some(conn) = &self.single_conn {
            let mut conn = conn.lock().await;
            let _: () = conn.del(key).await.map_err(NodeError::from)?;
        }
        Ok(())
    }
}
