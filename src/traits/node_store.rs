use crate::common::node::{Node, NodeFilter, NodeStatus};
use anyhow::Result;

/// Persistent catalog of cluster nodes. Status interpretation is the
/// monitor's concern; the store only guarantees per-key atomicity.
#[trait_variant::make(NodeStore: Send)]
pub trait UnsendNodeStore {
    /// Look up by stable node key. `NodeError::NotFound` when absent.
    async fn get_node_by_key(&self, key: &str) -> Result<Node>;
    /// Insert, assigning the registry id. `NodeError::DuplicateKey` when the
    /// key is already present. Returns the stored node.
    async fn add_node(&self, node: &Node) -> Result<Node>;
    async fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>>;
    /// Atomic status transition. `Online` also sets `active = true` and
    /// bumps `active_ts`; `Offline` leaves both untouched.
    async fn update_node_status(&self, key: &str, status: NodeStatus) -> Result<()>;
}
