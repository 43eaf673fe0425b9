//! Byte and image caches.
//!
//! This module provides:
//! - Disk caching of fetched bytes with LRU eviction
//! - Memory caching of decoded images bounded by pixel bytes

pub mod disk_cache;
pub mod memory_cache;

pub use disk_cache::{DEFAULT_MAX_CACHE_SIZE, DiskCache, SlotPin, default_cache_dir};
pub use memory_cache::{CacheStats, DEFAULT_CACHE_BYTES, MemoryImageCache};
