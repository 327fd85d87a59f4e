use crate::common::node::{Node, NodeFilter, NodeStatus};
use crate::common::utils::epoch_millis;
use crate::errors::NodeError;
use crate::traits::node_store::UnsendNodeStore;

use anyhow::Result;
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{
    BufReader,
    ErrorKind::NotFound,
    Read, Seek, SeekFrom, Write,
};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Registry backend keeping all nodes in one JSON document. Mutations take
/// an exclusive advisory lock on the file; the lock is released on close.
pub struct FileNodeStore {
    node_store_path: PathBuf,
}

impl FileNodeStore {
    pub fn new(path: &str) -> Self {
        Self {
            node_store_path: Path::new(path).to_owned(),
        }
    }

    // The helpers return NodeError directly: any io or JSON fault here is
    // the registry being unavailable.

    fn read_nodes(&self) -> Result<HashMap<String, Node>, NodeError> {
        let file = match File::open(&self.node_store_path) {
            Ok(f) => f,
            Err(e) if e.kind() == NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        let reader = BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(map) => Ok(map),
            Err(e) if e.is_eof() => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn open_locked(&self) -> Result<File, NodeError> {
        if let Some(dir) = self.node_store_path.parent() {
            if !dir.as_os_str().is_empty() {
                create_dir_all(dir)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.node_store_path)?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn read_locked(file: &mut File) -> Result<HashMap<String, Node>, NodeError> {
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        if contents.trim().is_empty() {
            Ok(HashMap::new())
        } else {
            Ok(serde_json::from_str(&contents)?)
        }
    }

    fn write_locked(file: &mut File, nodes: &HashMap<String, Node>) -> Result<(), NodeError> {
        let json = serde_json::to_string_pretty(nodes)?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

impl UnsendNodeStore for FileNodeStore {
    async fn get_node_by_key(&self, key: &str) -> Result<Node> {
        let nodes = self.read_nodes()?;
        nodes.get(key).cloned().ok_or_else(|| {
            NodeError::NotFound {
                key: key.to_string(),
            }
            .into()
        })
    }

    async fn add_node(&self, node: &Node) -> Result<Node> {
        let mut file = self.open_locked()?;
        let mut nodes = Self::read_locked(&mut file)?;

        if nodes.contains_key(&node.key) {
            return Err(NodeError::DuplicateKey {
                key: node.key.clone(),
            }
            .into());
        }

        let mut node = node.clone();
        node.id = Uuid::new_v4().simple().to_string();
        nodes.insert(node.key.clone(), node.clone());

        Self::write_locked(&mut file, &nodes)?;
        log::debug!("added node[{}] to {:?}", node.key, self.node_store_path);
        Ok(node)
    }

    async fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>> {
        let nodes = self.read_nodes()?;
        Ok(nodes.into_values().filter(|n| filter.matches(n)).collect())
    }

    async fn update_node_status(&self, key: &str, status: NodeStatus) -> Result<()> {
        let mut file = self.open_locked()?;
        let mut nodes = Self::read_locked(&mut file)?;

        let node = nodes.get_mut(key).ok_or_else(|| {
            anyhow::Error::from(NodeError::NotFound {
                key: key.to_string(),
            })
        })?;

        node.status = status;
        if status == NodeStatus::Online {
            node.active = true;
            node.active_ts = epoch_millis();
        }

        Self::write_locked(&mut file, &nodes)?;
        Ok(())
    }
}
