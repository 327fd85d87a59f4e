use anyhow::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::errors::NodeError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamMessageCode {
    Register,
    Ping,
    Pong,
}

/// One frame on a node stream. `REGISTER` must be the first frame a worker
/// sends; `PING` flows master-to-worker; `PONG` is an optional echo.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StreamMessage {
    pub code: StreamMessageCode,
    pub node_key: String,
}

impl StreamMessage {
    pub fn register(node_key: &str) -> Self {
        Self {
            code: StreamMessageCode::Register,
            node_key: node_key.to_string(),
        }
    }

    pub fn ping(node_key: &str) -> Self {
        Self {
            code: StreamMessageCode::Ping,
            node_key: node_key.to_string(),
        }
    }

    pub fn pong(node_key: &str) -> Self {
        Self {
            code: StreamMessageCode::Pong,
            node_key: node_key.to_string(),
        }
    }

    /// Serialize into the payload of a length-delimited frame.
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        serde_json::from_slice(frame).map_err(|e| {
            NodeError::InvalidMessage {
                reason: e.to_string(),
            }
            .into()
        })
    }
}
