use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::trace;

use crate::normalize::IdentityPreference;

/// Source backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Batched fact-gathering run over the whole fleet (ansible-playbook)
    FactCache {
        /// Playbook that gathers the telemetry facts
        #[serde(default = "default_playbook_path")]
        playbook: PathBuf,

        /// Inventory file handed to the playbook run
        #[serde(default = "default_inventory_path")]
        inventory: PathBuf,

        /// Directory the JSON fact cache is written to
        #[serde(default = "default_cache_dir")]
        cache_dir: PathBuf,
    },

    /// Per-host queries against a time-series endpoint at a fixed port
    Timeseries {
        /// Port the query endpoint listens on, on every host
        #[serde(default = "default_metrics_port")]
        port: u16,
    },

    /// Remote command execution per host, for auth-log scraping
    RemoteExec {
        /// Log file retrieved from each host
        #[serde(default = "default_auth_log_path")]
        log_path: PathBuf,
    },
}

fn default_playbook_path() -> PathBuf {
    PathBuf::from("./fetch_metrics.yml")
}

fn default_inventory_path() -> PathBuf {
    PathBuf::from("./inventory.yml")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./fact_cache")
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_auth_log_path() -> PathBuf {
    PathBuf::from("/var/log/auth.log")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub hosts: Vec<HostTarget>,

    pub source: SourceConfig,

    /// Seconds between collection cycles
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Bind address for the API server
    #[serde(default = "crate::util::get_listen_addr")]
    pub listen: SocketAddr,

    /// Memory usage above this percentage flags a host as high-memory
    #[serde(default = "crate::thresholds::default_high_memory_percent")]
    pub high_memory_percent: f64,

    /// Maximum simultaneous per-host fetches within one cycle
    #[serde(default = "default_worker_limit")]
    pub worker_limit: usize,

    /// Fetch attempts per host per cycle (transient failures only)
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Which hostname wins when the backend reports its own node identity
    #[serde(default)]
    pub identity: IdentityPreference,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct HostTarget {
    /// Unique, stable identifier for the host
    pub name: String,

    /// Network reachable endpoint
    pub address: String,

    /// Only consumed by backends that open their own sessions
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Credentials {
    pub user: String,
    pub key_path: Option<PathBuf>,
}

fn default_interval() -> u64 {
    15
}

fn default_worker_limit() -> usize {
    4
}

fn default_retry_attempts() -> u32 {
    2
}

impl Config {
    /// Reject configurations no cycle should ever start with.
    ///
    /// These are the only fatal conditions in the system; everything after
    /// startup degrades instead of aborting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.hosts.is_empty() {
            anyhow::bail!("configuration contains no hosts to monitor");
        }

        let mut names = HashSet::new();
        for host in &self.hosts {
            if host.name.is_empty() || host.address.is_empty() {
                anyhow::bail!("host entries need a non-empty name and address");
            }
            if !names.insert(host.name.as_str()) {
                anyhow::bail!("duplicate host name '{}' in configuration", host.name);
            }
        }

        if self.worker_limit == 0 {
            anyhow::bail!("worker_limit must be at least 1");
        }

        Ok(())
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config: &Config| trace!("loaded config: {config:?}"))
}
