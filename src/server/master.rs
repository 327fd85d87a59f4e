use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::common::config::{load_master_config, load_node_config, MasterConfig};
use crate::common::node::{Node, NodeStatus};
use crate::common::utils::epoch_millis;
use crate::errors::NodeError;
use crate::server::loader::load_node_store;
use crate::server::monitor;
use crate::server::shutdown::{wait_for_shutdown_signal, ShutdownSignal};
use crate::server::stream_server::StreamServer;
use crate::server::subscription::SubscriptionTable;
use crate::storage::node_store_impl::NodeStoreImpl;
use crate::traits::node_store::NodeStore;

const GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    New,
    Initialized,
    Running,
    Stopping,
    Stopped,
}

/// The coordinating node. Owns the stream server and the monitor loop,
/// registers itself in the node registry, and runs until a termination
/// signal or `stop()`.
pub struct MasterService {
    node_key: String,
    node_name: String,
    registry: Arc<NodeStoreImpl>,
    server: StreamServer,
    monitor_interval: Duration,
    stop_on_error: bool,
    shutdown: ShutdownSignal,
    state: RwLock<ServiceState>,
    monitor_handle: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl MasterService {
    /// Composition root: wires the registry backend, the subscription table,
    /// and the stream server from explicit configuration.
    pub async fn new(config: MasterConfig) -> Result<Arc<Self>> {
        let node_config = load_node_config(&config.config_path)?;
        let registry = Arc::new(load_node_store(&config).await?);
        let shutdown = ShutdownSignal::new();
        let subscriptions = Arc::new(SubscriptionTable::new());
        let server = StreamServer::new(
            &config.host,
            config.port,
            registry.clone(),
            subscriptions,
            shutdown.clone(),
        );

        let svc = Self {
            node_name: node_config.node_name().to_string(),
            node_key: node_config.key,
            registry,
            server,
            monitor_interval: config.monitor_interval,
            stop_on_error: config.stop_on_error,
            shutdown,
            state: RwLock::new(ServiceState::New),
            monitor_handle: Mutex::new(None),
        };
        *svc.state.write().unwrap() = ServiceState::Initialized;
        Ok(Arc::new(svc))
    }

    /// Start the stream server, register this master in the registry, spawn
    /// the monitor loop, then block until shutdown. Registration completes
    /// before the first monitor tick can run.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        self.server.start().await?;
        self.register().await?;

        let handle = tokio::spawn(monitor::run(
            self.registry.clone(),
            self.server.subscriptions(),
            self.node_key.clone(),
            self.monitor_interval,
            self.stop_on_error,
            self.shutdown.clone(),
        ));
        *self.monitor_handle.lock().await = Some(handle);
        *self.state.write().unwrap() = ServiceState::Running;

        self.wait().await;
        self.stop().await
    }

    /// Insert our own row, or mark the existing one online. Only `NotFound`
    /// is expected; anything else propagates.
    pub async fn register(&self) -> Result<()> {
        match self.registry.get_node_by_key(&self.node_key).await {
            Ok(node) => {
                log::info!("master[{}] exists in registry", self.node_key);
                self.registry
                    .update_node_status(&self.node_key, NodeStatus::Online)
                    .await?;
                log::info!("updated master[{}] in registry. id: {}", self.node_key, node.id);
                Ok(())
            }
            Err(e) if NodeError::is_not_found(&e) => {
                log::info!("master[{}] does not exist in registry", self.node_key);
                let mut node = Node::new(&self.node_key, &self.node_name, true);
                node.status = NodeStatus::Online;
                node.active = true;
                node.active_ts = epoch_millis();
                let stored = self.registry.add_node(&node).await?;
                log::info!("added master[{}] in registry. id: {}", self.node_key, stored.id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Block until an OS termination signal or a programmatic `stop()`.
    pub async fn wait(&self) {
        let mut shut = self.shutdown.subscribe();
        tokio::select! {
            res = wait_for_shutdown_signal() => {
                if let Err(e) = res {
                    log::error!("signal handler failed: {}", e);
                }
                log::info!("received shutdown signal");
            }
            _ = shut.recv() => {}
        }
    }

    /// Stop the stream server (closing every subscription) and wait out the
    /// monitor loop within the grace period. Returns the monitor's error
    /// when it stopped the service under `stop_on_error`.
    pub async fn stop(&self) -> Result<()> {
        *self.state.write().unwrap() = ServiceState::Stopping;
        self.shutdown.shutdown();
        self.server.stop();

        let grace = GRACE_PERIOD.min(self.monitor_interval);
        let handle = self.monitor_handle.lock().await.take();
        let mut result = Ok(());
        if let Some(handle) = handle {
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(res)) => result = res,
                Ok(Err(e)) => log::error!("monitor task failed: {}", e),
                Err(_) => log::warn!("monitor loop did not exit within {:?}", grace),
            }
        }

        *self.state.write().unwrap() = ServiceState::Stopped;
        log::info!("master[{}] service has stopped", self.node_key);
        result
    }

    pub fn node_key(&self) -> &str {
        &self.node_key
    }

    pub fn state(&self) -> ServiceState {
        *self.state.read().unwrap()
    }

    pub fn registry(&self) -> Arc<NodeStoreImpl> {
        self.registry.clone()
    }

    pub fn get_server(&self) -> &StreamServer {
        &self.server
    }
}

/// Binary entry point: logging, configuration, then run until shutdown.
pub async fn master_start() -> Result<()> {
    env_logger::init();
    let config = load_master_config()?;
    log::info!("starting master node (config: {})", config.config_path);
    let svc = MasterService::new(config).await?;
    svc.start().await
}
