//! Pipeline configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::args::CliArgs;
use crate::infrastructure::cache::{DEFAULT_CACHE_BYTES, DEFAULT_MAX_CACHE_SIZE, default_cache_dir};
use crate::infrastructure::executor::{ExecutorConfig, PoolSize};
use crate::infrastructure::transport::DEFAULT_TIMEOUT_SECS;

pub(crate) const APP_NAME: &str = "spear";
pub(crate) const APP_QUALIFIER: &str = "com";
pub(crate) const APP_ORGANIZATION: &str = "linuxmobile";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Worker count and queue bound of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Concurrent workers.
    pub workers: usize,
    /// Queued jobs kept before the oldest is discarded.
    pub queue: usize,
}

impl From<PoolConfig> for PoolSize {
    fn from(config: PoolConfig) -> Self {
        Self::new(config.workers, config.queue)
    }
}

/// Sizing of the dispatch, network and local pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolsConfig {
    /// Classification pool.
    #[serde(default = "default_single_pool")]
    pub dispatch: PoolConfig,
    /// Network fetch pool.
    #[serde(default = "default_network_pool")]
    pub network: PoolConfig,
    /// Local read and decode pool.
    #[serde(default = "default_single_pool")]
    pub local: PoolConfig,
}

impl Default for PoolsConfig {
    fn default() -> Self {
        Self {
            dispatch: default_single_pool(),
            network: default_network_pool(),
            local: default_single_pool(),
        }
    }
}

/// Pipeline configuration loaded from `config.toml` and CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpearConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Disk cache directory. Defaults to the platform cache dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Root directory for `asset://` identifiers.
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,

    /// Disk cache bound in bytes.
    #[serde(default = "default_disk_cache_bytes")]
    pub disk_cache_bytes: u64,

    /// Memory cache bound in decoded bytes.
    #[serde(default = "default_memory_cache_bytes")]
    pub memory_cache_bytes: usize,

    /// Network timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pool sizing.
    #[serde(default)]
    pub pools: PoolsConfig,
}

fn default_single_pool() -> PoolConfig {
    PoolConfig {
        workers: 1,
        queue: 20,
    }
}

fn default_network_pool() -> PoolConfig {
    PoolConfig {
        workers: 5,
        queue: 20,
    }
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("assets")
}

fn default_disk_cache_bytes() -> u64 {
    DEFAULT_MAX_CACHE_SIZE
}

fn default_memory_cache_bytes() -> usize {
    DEFAULT_CACHE_BYTES
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl SpearConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(cache_dir) = &args.cache_dir {
            self.cache_dir = Some(cache_dir.clone());
        }
        if let Some(asset_root) = &args.asset_root {
            self.asset_root = asset_root.clone();
        }
        if let Some(timeout) = args.timeout {
            self.timeout_secs = timeout;
        }
    }

    /// Returns the disk cache directory in effect.
    #[must_use]
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }

    /// Returns the network timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the pool sizing for [`Executors`](crate::infrastructure::Executors).
    #[must_use]
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            dispatch: self.pools.dispatch.into(),
            network: self.pools.network.into(),
            local: self.pools.local.into(),
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("spear.log"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}

impl Default for SpearConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            cache_dir: None,
            asset_root: default_asset_root(),
            disk_cache_bytes: default_disk_cache_bytes(),
            memory_cache_bytes: default_memory_cache_bytes(),
            timeout_secs: default_timeout_secs(),
            pools: PoolsConfig::default(),
        }
    }
}
