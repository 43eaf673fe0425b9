//! Pipeline configuration.

pub mod app_config;
pub mod args;
pub mod storage;

pub use app_config::{LogLevel, PoolConfig, PoolsConfig, SpearConfig};
pub use args::CliArgs;
pub use storage::{ConfigError, ConfigStore};
