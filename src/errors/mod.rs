use thiserror::Error;

/// Error taxonomy for the node-coordination core. Carried through
/// `anyhow::Error`; callers that need to branch on a kind use
/// `err.downcast_ref::<NodeError>()`.
#[derive(Error, Debug)]
pub enum NodeError {
    /// No node with this key in the registry. Expected during
    /// self-registration; distinguished from a store fault.
    #[error("node not found: {key}")]
    NotFound { key: String },

    /// A node with this key already exists. Fatal at registration: two
    /// processes share a node key.
    #[error("duplicate node key: {key}")]
    DuplicateKey { key: String },

    /// The backing store could not be reached or answered with a fault.
    #[error("node registry unavailable: {reason}")]
    RegistryUnavailable { reason: String },

    /// A stream handshake named a key the registry does not know.
    #[error("unregistered peer: {key}")]
    UnregisteredPeer { key: String },

    /// A registered worker has no live stream.
    #[error("no active subscription for node: {key}")]
    SubscriptionAbsent { key: String },

    /// Heartbeat could not be delivered on the worker's stream.
    #[error("cannot send to node {key}: {reason}")]
    SendFailed { key: String, reason: String },

    /// A frame that does not decode as a stream message.
    #[error("invalid stream message: {reason}")]
    InvalidMessage { reason: String },

    /// Aggregate result of a monitor tick in which at least one probe or
    /// registry call failed.
    #[error("node monitor tick completed with errors")]
    MonitorError,
}

impl NodeError {
    pub fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<NodeError>(), Some(NodeError::NotFound { .. }))
    }
}

impl From<redis::RedisError> for NodeError {
    fn from(err: redis::RedisError) -> Self {
        NodeError::RegistryUnavailable {
            reason: err.to_string(),
        }
    }
}

// Store backends speak io and JSON; any such fault is the registry being
// unavailable, so downcast-based callers see one type.
impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        NodeError::RegistryUnavailable {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::RegistryUnavailable {
            reason: err.to_string(),
        }
    }
}
