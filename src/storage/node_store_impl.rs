use crate::common::node::{Node, NodeFilter, NodeStatus};
use crate::storage::file::file_node_store::FileNodeStore;
use crate::storage::redis::redis_node_store::RedisNodeStore;
use crate::traits::node_store::{NodeStore, UnsendNodeStore};
use anyhow::Result;

pub enum NodeStoreImpl {
    File(FileNodeStore),
    Redis(RedisNodeStore),
}

impl NodeStore for NodeStoreImpl {
    async fn get_node_by_key(&self, key: &str) -> Result<Node> {
        match self {
            NodeStoreImpl::File(f) => f.get_node_by_key(key).await,
            NodeStoreImpl::Redis(r) => r.get_node_by_key(key).await,
        }
    }

    async fn add_node(&self, node: &Node) -> Result<Node> {
        match self {
            NodeStoreImpl::File(f) => f.add_node(node).await,
            NodeStoreImpl::Redis(r) => r.add_node(node).await,
        }
    }

    async fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>> {
        match self {
            NodeStoreImpl::File(f) => f.list_nodes(filter).await,
            NodeStoreImpl::Redis(r) => r.list_nodes(filter).await,
        }
    }

    async fn update_node_status(&self, key: &str, status: NodeStatus) -> Result<()> {
        match self {
            NodeStoreImpl::File(f) => f.update_node_status(key, status).await,
            NodeStoreImpl::Redis(r) => r.update_node_status(key, status).await,
        }
    }
}
