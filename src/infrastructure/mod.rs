//! Infrastructure layer with caches, pools and I/O adapters.

/// Disk and memory caches.
pub mod cache;
/// Application configuration.
pub mod config;
/// Decoder dispatch.
pub mod decode;
/// Worker pools.
pub mod executor;
/// Network transport.
pub mod transport;

pub use cache::{CacheStats, DiskCache, MemoryImageCache};
pub use config::{CliArgs, ConfigStore, LogLevel, SpearConfig};
pub use decode::{DecodeSource, DecoderDispatch, ImageCrateDecoder};
pub use executor::{ExecutorConfig, Executors, PoolSize, PoolStats, TaskPool};
pub use transport::HttpTransport;
