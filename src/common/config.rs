use serde::Deserialize;

use std::fs::File;
use std::io::BufReader;
use std::time::Duration;

use anyhow::{Context, Result};

/// Identity of this node, loaded from the node configuration file.
#[derive(Debug, Deserialize, Clone)]
pub struct NodeConfig {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl NodeConfig {
    /// Display name, falling back to the key.
    pub fn node_name(&self) -> &str {
        match &self.name {
            Some(name) if !name.is_empty() => name,
            _ => &self.key,
        }
    }
}

pub fn load_node_config(path: &str) -> Result<NodeConfig> {
    let file = File::open(path).with_context(|| format!("cannot open node config at {}", path))?;
    let reader = BufReader::new(file);
    let config: NodeConfig = serde_json::from_reader(reader)?;
    Ok(config)
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    File,
    Redis,
}

pub const DEFAULT_CONFIG_PATH: &str = "./config/node.json";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9666;
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(60);
pub const MIN_MONITOR_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_NODE_STORE_PATH: &str = "./data/nodes.json";

/// Master-side settings. Built programmatically in tests, from the
/// environment in the binary.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    pub config_path: String,
    pub host: String,
    pub port: u16,
    pub monitor_interval: Duration,
    pub stop_on_error: bool,
    pub node_store_type: StorageType,
    pub node_store_file_path: String,
    pub node_store_redis_urls: Option<String>,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            stop_on_error: false,
            node_store_type: StorageType::File,
            node_store_file_path: DEFAULT_NODE_STORE_PATH.to_string(),
            node_store_redis_urls: None,
        }
    }
}

/// Assemble the master configuration from the environment, with the node
/// config path taken from the first CLI argument when present.
pub fn load_master_config() -> Result<MasterConfig> {
    let mut config = MasterConfig::default();

    if let Some(path) = std::env::args().nth(1) {
        config.config_path = path;
    }
    if let Ok(host) = std::env::var("CRAWLMASTER_HOST") {
        config.host = host;
    }
    if let Ok(port) = std::env::var("CRAWLMASTER_PORT") {
        config.port = port.parse().context("CRAWLMASTER_PORT is not a port number")?;
    }
    if let Ok(secs) = std::env::var("CRAWLMASTER_MONITOR_INTERVAL_SECS") {
        let secs: u64 = secs
            .parse()
            .context("CRAWLMASTER_MONITOR_INTERVAL_SECS is not an integer")?;
        config.monitor_interval = Duration::from_secs(secs);
    }
    if let Ok(flag) = std::env::var("CRAWLMASTER_STOP_ON_ERROR") {
        config.stop_on_error = flag == "1" || flag.eq_ignore_ascii_case("true");
    }
    if let Ok(path) = std::env::var("CRAWLMASTER_DATA") {
        config.node_store_file_path = path;
    }
    if let Ok(urls) = std::env::var("CRAWLMASTER_REDIS_URLS") {
        config.node_store_type = StorageType::Redis;
        config.node_store_redis_urls = Some(urls);
    }

    if config.monitor_interval < MIN_MONITOR_INTERVAL {
        log::warn!(
            "monitor interval {:?} below minimum, clamping to {:?}",
            config.monitor_interval,
            MIN_MONITOR_INTERVAL
        );
        config.monitor_interval = MIN_MONITOR_INTERVAL;
    }

    Ok(config)
}
