use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::common::message::{StreamMessage, StreamMessageCode};
use crate::errors::NodeError;
use crate::server::shutdown::ShutdownSignal;
use crate::server::subscription::{Subscription, SubscriptionTable};
use crate::storage::node_store_impl::NodeStoreImpl;
use crate::traits::node_store::NodeStore;

const MAX_FRAME_LEN: usize = 64 * 1024;
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const OUTBOUND_BUFFER: usize = 16;

fn stream_codec() -> LengthDelimitedCodec {
    let mut builder = tokio_util::codec::length_delimited::Builder::new();
    builder.length_field_length(4);
    builder.max_frame_length(MAX_FRAME_LEN);
    builder.new_codec()
}

/// Accepts inbound worker streams and binds each to its node key in the
/// subscription table. The first frame on a stream must be `REGISTER`
/// carrying the worker's key; transport metadata is never consulted.
pub struct StreamServer {
    host: String,
    port: u16,
    registry: Arc<NodeStoreImpl>,
    subscriptions: Arc<SubscriptionTable>,
    shutdown: ShutdownSignal,
    local_addr: OnceLock<SocketAddr>,
}

impl StreamServer {
    pub fn new(
        host: &str,
        port: u16,
        registry: Arc<NodeStoreImpl>,
        subscriptions: Arc<SubscriptionTable>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            host: host.to_string(),
            port,
            registry,
            subscriptions,
            shutdown,
            local_addr: OnceLock::new(),
        }
    }

    /// Bind the listener and spawn the accept loop. Port 0 binds an
    /// ephemeral port; the bound address is available via `local_addr`.
    pub async fn start(&self) -> Result<()> {
        let listener = TcpListener::bind(format!("{}:{}", self.host, self.port))
            .await
            .with_context(|| format!("cannot bind stream server to {}:{}", self.host, self.port))?;
        let addr = listener.local_addr()?;
        let _ = self.local_addr.set(addr);
        log::info!("stream server listening on {}", addr);

        tokio::spawn(accept_loop(
            listener,
            self.registry.clone(),
            self.subscriptions.clone(),
            self.shutdown.clone(),
        ));
        Ok(())
    }

    /// Stop accepting and close every subscription.
    pub fn stop(&self) {
        self.shutdown.shutdown();
        self.subscriptions.clear();
        log::info!("stream server stopped");
    }

    pub fn get_subscribe(&self, node_key: &str) -> Result<Subscription> {
        self.subscriptions.get(node_key).ok_or_else(|| {
            NodeError::SubscriptionAbsent {
                key: node_key.to_string(),
            }
            .into()
        })
    }

    pub fn subscriptions(&self) -> Arc<SubscriptionTable> {
        self.subscriptions.clone()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<NodeStoreImpl>,
    subscriptions: Arc<SubscriptionTable>,
    shutdown: ShutdownSignal,
) {
    let mut shut = shutdown.subscribe();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        log::warn!("accept failed: {}", e);
                        continue;
                    }
                };
                if let Err(e) = stream.set_nodelay(true) {
                    log::warn!("failed to set TCP_NODELAY: {:?}", e);
                }
                log::debug!("accepted connection from {}", remote);

                let registry = registry.clone();
                let subscriptions = subscriptions.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, remote, registry, subscriptions, shutdown).await {
                        log::error!("connection error from {}: {:#}", remote, e);
                    }
                });
            }
            _ = shut.recv() => {
                log::info!("stream server stopped accepting connections");
                break;
            }
        }
    }
}

/// Drive one worker stream: handshake, bind the subscription, then pump
/// frames in both directions until error, EOF, replacement, or shutdown.
async fn handle_connection(
    stream: TcpStream,
    remote: SocketAddr,
    registry: Arc<NodeStoreImpl>,
    subscriptions: Arc<SubscriptionTable>,
    shutdown: ShutdownSignal,
) -> Result<()> {
    let mut framed = Framed::new(stream, stream_codec());

    let first = tokio::time::timeout(HANDSHAKE_TIMEOUT, framed.next())
        .await
        .context("handshake timed out")?;
    let frame = match first {
        Some(frame) => frame.context("failed to read handshake frame")?,
        None => return Ok(()), // peer went away before identifying itself
    };
    let hello = StreamMessage::decode(&frame)?;
    if hello.code != StreamMessageCode::Register {
        return Err(NodeError::InvalidMessage {
            reason: format!("expected REGISTER as first frame, got {:?}", hello.code),
        }
        .into());
    }
    let node_key = hello.node_key;

    // Only registered nodes may hold a stream. Status stays untouched here:
    // the monitor loop and self-registration own status transitions.
    if let Err(e) = registry.get_node_by_key(&node_key).await {
        if NodeError::is_not_found(&e) {
            let rejected = NodeError::UnregisteredPeer { key: node_key };
            log::warn!("rejecting stream from {}: {}", remote, rejected);
            return Ok(());
        }
        return Err(e);
    }

    let (tx, mut rx) = mpsc::channel(OUTBOUND_BUFFER);
    let sub = Subscription::new(&node_key, tx);
    let sub_id = sub.id();
    subscriptions.put(sub);
    log::info!("subscription established for node[{}] from {}", node_key, remote);

    let mut shut = shutdown.subscribe();
    loop {
        tokio::select! {
            inbound = framed.next() => match inbound {
                Some(Ok(frame)) => match StreamMessage::decode(&frame) {
                    Ok(msg) => {
                        // PONG is informational; stream health is inferred
                        // from send success alone.
                        log::debug!("received {:?} from node[{}]", msg.code, msg.node_key);
                    }
                    Err(e) => log::warn!("undecodable frame from node[{}]: {:#}", node_key, e),
                },
                Some(Err(e)) => {
                    log::warn!("stream error for node[{}]: {}", node_key, e);
                    break;
                }
                None => {
                    log::debug!("node[{}] disconnected", node_key);
                    break;
                }
            },
            outbound = rx.recv() => match outbound {
                Some(msg) => {
                    let bytes = match msg.encode() {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            log::error!("cannot encode message for node[{}]: {:#}", node_key, e);
                            break;
                        }
                    };
                    if let Err(e) = framed.send(bytes).await {
                        log::warn!("cannot write to node[{}]: {}", node_key, e);
                        break;
                    }
                }
                None => break, // replaced or closed by the table
            },
            _ = shut.recv() => break,
        }
    }

    if subscriptions.delete_if_same(&node_key, sub_id) {
        log::info!("subscription lost for node[{}]", node_key);
    }
    Ok(())
}
