use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;

use crate::common::message::StreamMessage;
use crate::common::node::{NodeFilter, NodeStatus};
use crate::errors::NodeError;
use crate::server::shutdown::ShutdownSignal;
use crate::server::subscription::SubscriptionTable;
use crate::storage::node_store_impl::NodeStoreImpl;
use crate::traits::node_store::NodeStore;

/// Periodic liveness loop. Ticks immediately, then every `interval` until
/// shutdown. Under `stop_on_error` a failed tick trips the shutdown signal
/// and surfaces the error to the master.
pub(crate) async fn run(
    registry: Arc<NodeStoreImpl>,
    subscriptions: Arc<SubscriptionTable>,
    master_key: String,
    interval: Duration,
    stop_on_error: bool,
    shutdown: ShutdownSignal,
) -> Result<()> {
    let mut shut = shutdown.subscribe();
    loop {
        if shut.try_recv().is_ok() {
            log::debug!("monitor loop observed shutdown");
            return Ok(());
        }

        if let Err(e) = tick(&registry, &subscriptions, &master_key, interval / 4).await {
            log::error!("monitor tick failed: {:#}", e);
            if stop_on_error {
                shutdown.shutdown();
                return Err(e);
            }
        }

        tokio::select! {
            _ = shut.recv() => {
                log::debug!("monitor loop observed shutdown");
                return Ok(());
            }
            _ = sleep(interval) => {}
        }
    }
}

/// One monitor tick: refresh the master's own row, then probe every enabled
/// worker through its subscription. Per-worker failures mark that worker
/// offline and flag the tick without stopping the sweep.
pub(crate) async fn tick(
    registry: &NodeStoreImpl,
    subscriptions: &SubscriptionTable,
    master_key: &str,
    send_deadline: Duration,
) -> Result<()> {
    // Our own row comes first; a registry that cannot take the refresh
    // fails the whole tick before any worker is probed.
    if let Err(e) = registry
        .update_node_status(master_key, NodeStatus::Online)
        .await
    {
        log::error!("cannot refresh master[{}] status: {:#}", master_key, e);
        return Err(e);
    }

    let nodes = registry.list_nodes(&NodeFilter::workers()).await?;

    let mut is_err = false;

    for node in nodes {
        if !node.enabled {
            continue;
        }

        let sub = match subscriptions.get(&node.key) {
            Some(sub) => sub,
            None => {
                log::warn!("worker[{}] has no active subscription", node.key);
                is_err = true;
                set_worker_offline(registry, &node.key).await;
                continue;
            }
        };

        // A delivered PING proves the transport is open right now, nothing
        // more; workers come online through their own registration path.
        if let Err(e) = sub
            .send_timeout(StreamMessage::ping(master_key), send_deadline)
            .await
        {
            log::error!("cannot ping worker[{}]: {:#}", node.key, e);
            is_err = true;
            set_worker_offline(registry, &node.key).await;
            continue;
        }
    }

    if is_err {
        return Err(NodeError::MonitorError.into());
    }
    Ok(())
}

async fn set_worker_offline(registry: &NodeStoreImpl, key: &str) {
    if let Err(e) = registry.update_node_status(key, NodeStatus::Offline).await {
        log::error!("cannot mark worker[{}] offline: {:#}", key, e);
    }
}
