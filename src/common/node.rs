use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Online,
    Offline,
}

/// A participating process in the cluster, keyed by a stable `key` chosen
/// by the node itself. `id` is assigned by the registry on insert.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Node {
    pub id: String,
    pub key: String,
    pub name: String,
    pub is_master: bool,
    pub status: NodeStatus,
    pub enabled: bool,
    pub active: bool,
    pub active_ts: i64, // milliseconds since UNIX_EPOCH of last successful contact
}

impl Node {
    pub fn new(key: &str, name: &str, is_master: bool) -> Self {
        let name = if name.is_empty() { key } else { name };
        Self {
            id: String::new(),
            key: key.to_string(),
            name: name.to_string(),
            is_master,
            status: NodeStatus::Offline,
            enabled: true,
            active: false,
            active_ts: 0,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct NodeFilter {
    pub is_master: Option<bool>,
    pub enabled: Option<bool>,
    pub status: Option<NodeStatus>,
}

impl NodeFilter {
    /// All non-master nodes, the monitor's sweep set.
    pub fn workers() -> Self {
        Self {
            is_master: Some(false),
            ..Self::default()
        }
    }

    pub fn matches(&self, node: &Node) -> bool {
        if self.is_master.is_some_and(|m| node.is_master != m) {
            return false;
        }
        if self.enabled.is_some_and(|e| node.enabled != e) {
            return false;
        }
        if self.status.is_some_and(|s| node.status != s) {
            return false;
        }
        true
    }
}
