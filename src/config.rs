//! Configuration for the ledger store and the node process

use anyhow::Context;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port nodes listen on unless configured otherwise
pub const DEFAULT_PORT: u16 = 7075;

/// Named environment selecting storage location, genesis and difficulty
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Live,
    Test,
}

impl Network {
    pub fn default_data_dir(self) -> PathBuf {
        match self {
            Network::Live => PathBuf::from("data/live"),
            Network::Test => PathBuf::from("data/test"),
        }
    }

    pub fn default_work_threshold(self) -> u64 {
        match self {
            Network::Live => 0xffff_ffc0_0000_0000,
            Network::Test => 0xff00_0000_0000_0000,
        }
    }

    /// Second byte of every packet header
    pub fn magic(self) -> u8 {
        match self {
            Network::Live => b'C',
            Network::Test => b'A',
        }
    }

    pub fn from_magic(byte: u8) -> Option<Self> {
        match byte {
            b'C' => Some(Network::Live),
            b'A' => Some(Network::Test),
            _ => None,
        }
    }
}

/// Settings for opening a block store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub network: Network,
    pub path: PathBuf,
    pub work_threshold: u64,
}

impl LedgerConfig {
    pub fn new(network: Network) -> Self {
        LedgerConfig {
            network,
            path: network.default_data_dir(),
            work_threshold: network.default_work_threshold(),
        }
    }

    pub fn live() -> Self {
        Self::new(Network::Live)
    }

    pub fn test() -> Self {
        Self::new(Network::Test)
    }

    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_work_threshold(mut self, threshold: u64) -> Self {
        self.work_threshold = threshold;
        self
    }
}

/// Settings for the node process, read from a TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub network: Network,

    /// Overrides the network's default storage directory
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Peers known at startup
    #[serde(default)]
    pub peers: Vec<SocketAddr>,

    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,

    /// Peers not contacted within this window receive a keepalive
    #[serde(default = "default_peer_cutoff")]
    pub peer_cutoff_secs: u64,

    /// Upper bound on the peer registry; further peers are ignored
    #[serde(default = "default_max_peers")]
    pub max_peers: usize,

    #[serde(default)]
    pub work_threshold: Option<u64>,
}

fn default_listen_port() -> u16 {
    DEFAULT_PORT
}

fn default_keepalive_interval() -> u64 {
    20
}

fn default_peer_cutoff() -> u64 {
    300
}

fn default_max_peers() -> usize {
    1024
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            network: Network::default(),
            data_dir: None,
            listen_port: default_listen_port(),
            peers: Vec::new(),
            keepalive_interval_secs: default_keepalive_interval(),
            peer_cutoff_secs: default_peer_cutoff(),
            max_peers: default_max_peers(),
            work_threshold: None,
        }
    }
}

impl NodeConfig {
    /// Parses a configuration from TOML text
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: NodeConfig = toml::from_str(text).context("invalid node configuration")?;

        if config.keepalive_interval_secs == 0 {
            anyhow::bail!("keepalive_interval_secs must be greater than zero");
        }

        Ok(config)
    }

    /// Loads the configuration file, falling back to defaults when it is absent
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(NodeConfig::default());
        }

        let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&text)
    }

    /// Store settings derived from this node configuration
    pub fn ledger(&self) -> LedgerConfig {
        let mut ledger = LedgerConfig::new(self.network);
        if let Some(dir) = &self.data_dir {
            ledger = ledger.with_path(dir);
        }
        if let Some(threshold) = self.work_threshold {
            ledger = ledger.with_work_threshold(threshold);
        }
        ledger
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn peer_cutoff(&self) -> Duration {
        Duration::from_secs(self.peer_cutoff_secs)
    }
}
