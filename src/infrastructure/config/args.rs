use super::app_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "spear",
    version,
    about = "Fetch, cache and decode images from network and local sources",
    long_about = None
)]
pub struct CliArgs {
    /// Resources to load (http, https, file, asset, content, embedded).
    #[arg(value_name = "URI")]
    pub uris: Vec<String>,

    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Disk cache directory.
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Root directory for `asset://` identifiers.
    #[arg(long, value_name = "DIR")]
    pub asset_root: Option<PathBuf>,

    /// Network timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Clear memory and disk caches before loading.
    #[arg(long)]
    pub clear_cache: bool,
}
