//! In-memory LRU image cache bounded by decoded pixel bytes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use lru::LruCache;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::domain::entities::{SharedImage, image_bytes};
use crate::domain::ports::ImageCachePort;

/// Default memory budget for decoded images (64 MB).
pub const DEFAULT_CACHE_BYTES: usize = 64 * 1024 * 1024;

struct CachedImage {
    image: SharedImage,
    bytes: usize,
    backing: Option<PathBuf>,
}

struct Entries {
    lru: LruCache<String, CachedImage>,
    bytes: usize,
}

impl Entries {
    fn remove(&mut self, key: &str) -> bool {
        match self.lru.pop(key) {
            Some(entry) => {
                self.bytes -= entry.bytes;
                true
            }
            None => false,
        }
    }
}

/// In-memory LRU cache for decoded images.
/// Thread-safe and evicts least recently used entries once the byte budget
/// is exceeded.
pub struct MemoryImageCache {
    entries: RwLock<Entries>,
    max_bytes: usize,
    len: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryImageCache {
    /// Creates a new cache holding at most `max_bytes` of decoded pixels.
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            entries: RwLock::new(Entries {
                lru: LruCache::unbounded(),
                bytes: 0,
            }),
            max_bytes: max_bytes.max(1),
            len: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Creates a new cache with the default budget.
    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CACHE_BYTES)
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: self.len(),
            bytes: self.entries.try_read().map(|e| e.bytes).unwrap_or(0),
        }
    }

    /// Peeks at an image without promoting it in the LRU.
    pub async fn peek(&self, key: &str) -> Option<SharedImage> {
        let entries = self.entries.read().await;
        entries.lru.peek(key).map(|entry| entry.image.clone())
    }

    fn sync_len(&self, entries: &Entries) {
        self.len.store(entries.lru.len(), Ordering::Relaxed);
    }
}

impl Default for MemoryImageCache {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub size: usize,
    /// Decoded bytes currently held.
    pub bytes: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} images ({} bytes), {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.bytes, self.hit_rate, self.hits, self.misses
        )
    }
}

#[async_trait::async_trait]
impl ImageCachePort for MemoryImageCache {
    async fn get(&self, key: &str) -> Option<SharedImage> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.lru.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key, "Memory cache hit");
            Some(entry.image.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key, "Memory cache miss");
            None
        }
    }

    async fn put(&self, key: String, image: SharedImage, backing: Option<PathBuf>) {
        let bytes = image_bytes(&image);
        if bytes > self.max_bytes {
            debug!(key = %key, bytes, "Image larger than memory cache budget, not cached");
            return;
        }

        let mut entries = self.entries.write().await;
        entries.remove(&key);
        entries.lru.put(
            key.clone(),
            CachedImage {
                image,
                bytes,
                backing,
            },
        );
        entries.bytes += bytes;
        debug!(key = %key, bytes, "Storing image in memory cache");

        while entries.bytes > self.max_bytes {
            let Some((evicted, entry)) = entries.lru.pop_lru() else {
                break;
            };
            entries.bytes -= entry.bytes;
            trace!(key = %evicted, "Evicted image from memory cache");
        }
        self.sync_len(&entries);
    }

    async fn evict(&self, key: &str) {
        let mut entries = self.entries.write().await;
        if entries.remove(key) {
            debug!(key, "Evicted image from memory cache");
        }
        self.sync_len(&entries);
    }

    async fn invalidate_disk_backed(&self, slot: Option<&Path>) {
        let mut entries = self.entries.write().await;
        let stale: Vec<String> = entries
            .lru
            .iter()
            .filter(|(_, entry)| match (&entry.backing, slot) {
                (Some(backing), Some(slot)) => backing == slot,
                (Some(_), None) => true,
                (None, _) => false,
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.remove(key);
        }
        self.sync_len(&entries);
        if !stale.is_empty() {
            debug!(count = stale.len(), "Invalidated disk-backed memory entries");
        }
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.lru.clear();
        entries.bytes = 0;
        self.sync_len(&entries);
        debug!("Cleared memory image cache");
    }
}
