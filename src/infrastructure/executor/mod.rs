//! Worker pools for classification, network fetches and local decoding.

pub mod pool;

pub use pool::{ExecutorConfig, Executors, Job, PoolSize, PoolStats, TaskPool};
