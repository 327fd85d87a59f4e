use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::common::message::StreamMessage;
use crate::common::utils::epoch_millis;
use crate::errors::NodeError;

/// Binding of a node key to its live stream. The connection task owns the
/// socket; this handle feeds its outbound channel. Dropping the last sender
/// closes the stream: the task observes channel closure and shuts down.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub node_key: String,
    pub established_at: i64,
    id: Uuid,
    sender: mpsc::Sender<StreamMessage>,
}

impl Subscription {
    pub fn new(node_key: &str, sender: mpsc::Sender<StreamMessage>) -> Self {
        Self {
            node_key: node_key.to_string(),
            established_at: epoch_millis(),
            id: Uuid::new_v4(),
            sender,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Deliver a message to the stream, bounded by `deadline`. A closed
    /// channel (the connection task is gone) or an elapsed deadline (its
    /// outbound buffer is stuck) both count as a send failure.
    pub async fn send_timeout(&self, msg: StreamMessage, deadline: Duration) -> Result<()> {
        match tokio::time::timeout(deadline, self.sender.send(msg)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(NodeError::SendFailed {
                key: self.node_key.clone(),
                reason: "stream closed".to_string(),
            }
            .into()),
            Err(_) => Err(NodeError::SendFailed {
                key: self.node_key.clone(),
                reason: format!("send timed out after {:?}", deadline),
            }
            .into()),
        }
    }
}

/// Map from node key to its active subscription. One mutex guards the map;
/// `send` on a handle is serialized by the stream's own channel, so
/// per-entry locks are unnecessary.
pub struct SubscriptionTable {
    inner: Mutex<HashMap<String, Subscription>>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Insert, replacing any prior entry for the key. The prior handle is
    /// dropped here, which closes its stream.
    pub fn put(&self, sub: Subscription) {
        let mut map = self.inner.lock().unwrap();
        if map.insert(sub.node_key.clone(), sub).is_some() {
            log::debug!("replaced existing subscription");
        }
    }

    pub fn get(&self, node_key: &str) -> Option<Subscription> {
        self.inner.lock().unwrap().get(node_key).cloned()
    }

    pub fn delete(&self, node_key: &str) {
        self.inner.lock().unwrap().remove(node_key);
    }

    /// Remove only when the stored entry is the given connection. Connection
    /// tasks call this on teardown so they never tear down a replacement
    /// subscription that has already taken their key.
    pub fn delete_if_same(&self, node_key: &str, id: Uuid) -> bool {
        let mut map = self.inner.lock().unwrap();
        if map.get(node_key).is_some_and(|s| s.id == id) {
            map.remove(node_key);
            return true;
        }
        false
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Drop every subscription, closing all streams.
    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }
}

impl Default for SubscriptionTable {
    fn default() -> Self {
        Self::new()
    }
}
