//! Disk-based byte cache for persistence across sessions.
//!
//! Slots are content-addressed files named by a hash of the resource
//! identifier. Fetches write to a `.part` sibling which is renamed into place
//! on success, so a slot file is always complete.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use lru::LruCache;
use parking_lot::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use crate::domain::entities::ResourceUri;
use crate::domain::errors::{LoadError, LoadResult};

/// Maximum disk cache size in bytes (100 MB default).
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 100 * 1024 * 1024;

const SLOT_EXTENSION: &str = "img";
const PARTIAL_EXTENSION: &str = "part";

/// Recency-ordered slot sizes.
struct DiskIndex {
    entries: LruCache<PathBuf, u64>,
    total: u64,
}

impl DiskIndex {
    fn insert(&mut self, slot: PathBuf, size: u64) {
        if let Some(old) = self.entries.put(slot, size) {
            self.total -= old;
        }
        self.total += size;
    }

    fn remove(&mut self, slot: &Path) -> Option<u64> {
        let size = self.entries.pop(slot)?;
        self.total -= size;
        Some(size)
    }
}

/// Disk-based cache that persists fetched bytes.
pub struct DiskCache {
    cache_dir: PathBuf,
    max_size: u64,
    index: Mutex<DiskIndex>,
    writing: Mutex<HashSet<PathBuf>>,
    pins: Mutex<HashMap<PathBuf, usize>>,
}

/// Keeps a slot out of size-based eviction while it is alive.
///
/// Taken by a fetch for its whole run and by every decode that reads the
/// slot afterwards.
#[must_use = "the slot is only protected while the pin is held"]
pub struct SlotPin {
    cache: Arc<DiskCache>,
    slot: PathBuf,
}

impl SlotPin {
    /// The pinned slot.
    #[must_use]
    pub fn slot(&self) -> &Path {
        &self.slot
    }
}

impl Drop for SlotPin {
    fn drop(&mut self) {
        let mut pins = self.cache.pins.lock();
        if let Some(count) = pins.get_mut(&self.slot) {
            *count -= 1;
            if *count == 0 {
                pins.remove(&self.slot);
            }
        }
    }
}

impl std::fmt::Debug for SlotPin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SlotPin").field(&self.slot).finish()
    }
}

impl std::fmt::Debug for DiskCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCache")
            .field("cache_dir", &self.cache_dir)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl DiskCache {
    /// Creates a new disk cache in the specified directory.
    ///
    /// Existing slots are indexed oldest-access first; leftover partial files
    /// from aborted fetches are removed.
    ///
    /// # Errors
    /// Returns error if cache directory cannot be created or read.
    pub async fn new(cache_dir: PathBuf, max_size: u64) -> LoadResult<Self> {
        fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| LoadError::io(format!("Failed to create cache dir: {e}")))?;

        let mut entries = fs::read_dir(&cache_dir)
            .await
            .map_err(|e| LoadError::io(format!("Failed to read cache dir: {e}")))?;

        let mut found: Vec<(PathBuf, SystemTime, u64)> = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if has_extension(&path, PARTIAL_EXTENSION) {
                let _ = fs::remove_file(&path).await;
                continue;
            }
            if has_extension(&path, SLOT_EXTENSION)
                && let Ok(meta) = entry.metadata().await
            {
                let accessed = meta.accessed().unwrap_or(SystemTime::UNIX_EPOCH);
                found.push((path, accessed, meta.len()));
            }
        }
        found.sort_by_key(|(_, time, _)| *time);

        let mut index = DiskIndex {
            entries: LruCache::unbounded(),
            total: 0,
        };
        for (path, _, size) in found {
            index.insert(path, size);
        }

        debug!(
            dir = %cache_dir.display(),
            entries = index.entries.len(),
            bytes = index.total,
            "Opened disk cache"
        );

        let cache = Self {
            cache_dir,
            max_size,
            index: Mutex::new(index),
            writing: Mutex::new(HashSet::new()),
            pins: Mutex::new(HashMap::new()),
        };

        cache.cleanup_if_needed().await;

        Ok(cache)
    }

    /// Creates a cache in the default location (platform cache dir).
    ///
    /// # Errors
    /// Returns error if cache directory cannot be created.
    pub async fn default_location() -> LoadResult<Self> {
        Self::new(default_cache_dir(), DEFAULT_MAX_CACHE_SIZE).await
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the slot path for a resource. Deterministic and collision-free
    /// for distinct identifiers.
    #[must_use]
    pub fn resolve_slot(&self, uri: &ResourceUri) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{SLOT_EXTENSION}", uri.slot_key()))
    }

    /// Returns the scratch file a fetch writes to before commit.
    #[must_use]
    pub fn partial_path(slot: &Path) -> PathBuf {
        slot.with_extension(PARTIAL_EXTENSION)
    }

    /// Checks whether a slot holds a complete, non-empty, unexpired entry.
    ///
    /// An expired entry reports false; the file stays in place until a fetch
    /// overwrites it.
    pub async fn exists(&self, slot: &Path, validity: Option<Duration>) -> bool {
        let Ok(meta) = fs::metadata(slot).await else {
            return false;
        };
        if !meta.is_file() || meta.len() == 0 {
            return false;
        }
        if let Some(validity) = validity {
            let age = meta
                .modified()
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .unwrap_or(Duration::MAX);
            if age > validity {
                trace!(slot = %slot.display(), ?age, "Disk cache entry expired");
                return false;
            }
        }
        true
    }

    /// Returns the slot for `uri` if it holds a valid entry.
    pub async fn cache_file_for(
        &self,
        uri: &ResourceUri,
        validity: Option<Duration>,
    ) -> Option<PathBuf> {
        let slot = self.resolve_slot(uri);
        self.exists(&slot, validity).await.then_some(slot)
    }

    /// Reads a slot and marks it recently used.
    pub async fn read(&self, slot: &Path) -> Option<Vec<u8>> {
        match fs::read(slot).await {
            Ok(bytes) if !bytes.is_empty() => {
                trace!(slot = %slot.display(), "Disk cache hit");
                self.touch(slot);
                Some(bytes)
            }
            _ => {
                trace!(slot = %slot.display(), "Disk cache miss");
                None
            }
        }
    }

    /// Marks a slot as recently used.
    pub fn touch(&self, slot: &Path) {
        self.index.lock().entries.promote(slot);
    }

    /// Protects `slot` from size-based eviction until the pin is dropped.
    pub fn pin(self: &Arc<Self>, slot: &Path) -> SlotPin {
        *self.pins.lock().entry(slot.to_path_buf()).or_insert(0) += 1;
        SlotPin {
            cache: Arc::clone(self),
            slot: slot.to_path_buf(),
        }
    }

    /// Returns true while any [`SlotPin`] for `slot` is alive.
    #[must_use]
    pub fn is_pinned(&self, slot: &Path) -> bool {
        self.pins.lock().contains_key(slot)
    }

    /// Reserves a slot for an incoming fetch and returns the scratch path to
    /// write to. The slot is protected from eviction until committed or aborted.
    pub async fn begin_write(&self, slot: &Path) -> PathBuf {
        self.writing.lock().insert(slot.to_path_buf());
        let partial = Self::partial_path(slot);
        let _ = fs::remove_file(&partial).await;
        partial
    }

    /// Returns true while a fetch holds the slot.
    #[must_use]
    pub fn is_writing(&self, slot: &Path) -> bool {
        self.writing.lock().contains(slot)
    }

    /// Moves a finished scratch file into its slot.
    ///
    /// # Errors
    /// Returns error if the scratch file is missing, empty, or cannot be renamed.
    pub async fn commit(&self, slot: &Path) -> LoadResult<u64> {
        let partial = Self::partial_path(slot);
        let result = self.commit_inner(slot, &partial).await;
        if result.is_err() {
            let _ = fs::remove_file(&partial).await;
        }
        self.writing.lock().remove(slot);
        if result.is_ok() {
            self.cleanup_if_needed().await;
        }
        result
    }

    async fn commit_inner(&self, slot: &Path, partial: &Path) -> LoadResult<u64> {
        let size = fs::metadata(partial)
            .await
            .map_err(|e| LoadError::io(format!("Missing fetched file: {e}")))?
            .len();
        if size == 0 {
            return Err(LoadError::fetch("empty response body"));
        }
        fs::rename(partial, slot)
            .await
            .map_err(|e| LoadError::io(format!("Failed to commit cache file: {e}")))?;

        self.index.lock().insert(slot.to_path_buf(), size);
        debug!(slot = %slot.display(), size, "Stored entry in disk cache");
        Ok(size)
    }

    /// Discards a scratch file after a failed fetch. The slot is untouched.
    pub async fn abort(&self, slot: &Path) {
        let _ = fs::remove_file(Self::partial_path(slot)).await;
        self.writing.lock().remove(slot);
        trace!(slot = %slot.display(), "Discarded partial download");
    }

    /// Stores raw bytes in a slot.
    ///
    /// # Errors
    /// Returns error if file cannot be created or written.
    pub async fn put_bytes(&self, slot: &Path, bytes: &[u8]) -> LoadResult<u64> {
        let partial = self.begin_write(slot).await;
        let written = async {
            let mut file = fs::File::create(&partial)
                .await
                .map_err(|e| LoadError::io(format!("Failed to create cache file: {e}")))?;
            file.write_all(bytes)
                .await
                .map_err(|e| LoadError::io(format!("Failed to write cache file: {e}")))?;
            file.flush()
                .await
                .map_err(|e| LoadError::io(format!("Failed to flush cache file: {e}")))
        }
        .await;

        match written {
            Ok(()) => self.commit(slot).await,
            Err(e) => {
                self.abort(slot).await;
                Err(e)
            }
        }
    }

    /// Removes a slot from disk cache.
    pub async fn evict(&self, slot: &Path) {
        if let Err(e) = fs::remove_file(slot).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(slot = %slot.display(), error = %e, "Failed to evict from disk cache");
            }
        } else {
            debug!(slot = %slot.display(), "Evicted from disk cache");
        }
        self.index.lock().remove(slot);
    }

    /// Clears the entire disk cache. Individual removal failures are logged
    /// and skipped.
    ///
    /// # Errors
    /// Returns error if cache directory cannot be read.
    pub async fn clear(&self) -> LoadResult<()> {
        let mut entries = fs::read_dir(&self.cache_dir)
            .await
            .map_err(|e| LoadError::io(format!("Failed to read cache dir: {e}")))?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !has_extension(&path, SLOT_EXTENSION) {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => {
                    self.index.lock().remove(&path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove cache file"),
            }
        }
        debug!("Cleared disk cache");
        Ok(())
    }

    /// Returns the current cache size in bytes.
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.index.lock().total
    }

    /// Returns the number of cached files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.lock().entries.len()
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes least recently used entries if over the size limit. Slots held
    /// by an active fetch or a [`SlotPin`] are never chosen.
    async fn cleanup_if_needed(&self) {
        let victims: Vec<(PathBuf, u64)> = {
            let index = self.index.lock();
            if index.total <= self.max_size {
                return;
            }
            let writing = self.writing.lock();
            let pins = self.pins.lock();
            let target = index.total - self.max_size + (self.max_size / 10);

            debug!(
                current_size = index.total,
                max_size = self.max_size,
                "Disk cache over limit, cleaning up"
            );

            let mut freed = 0u64;
            index
                .entries
                .iter()
                .rev()
                .filter(|(path, _)| !writing.contains(*path) && !pins.contains_key(*path))
                .take_while(|(_, size)| {
                    let take = freed < target;
                    freed += **size;
                    take
                })
                .map(|(path, size)| (path.clone(), *size))
                .collect()
        };

        let mut freed_size = 0u64;
        let mut freed_count = 0usize;
        for (path, size) in victims {
            if self.is_writing(&path) || self.is_pinned(&path) {
                continue;
            }
            if let Err(e) = fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove old cache file");
                continue;
            }
            self.index.lock().remove(&path);
            freed_size += size;
            freed_count += 1;
        }

        debug!(freed_size, freed_count, "Disk cache cleanup complete");
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e == ext)
}

/// Returns the default cache directory path.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "linuxmobile", "spear").map_or_else(
        || std::env::temp_dir().join("spear").join("cache"),
        |dirs| dirs.cache_dir().join("images"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_cache(max_size: u64) -> (DiskCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path().to_path_buf(), max_size)
            .await
            .unwrap();
        (cache, temp_dir)
    }

    fn uri(s: &str) -> ResourceUri {
        ResourceUri::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_put_and_read_round_trip() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        let slot = cache.resolve_slot(&uri("https://example.com/1.png"));

        cache.put_bytes(&slot, b"test image data").await.unwrap();

        assert!(cache.exists(&slot, None).await);
        assert_eq!(cache.read(&slot).await.unwrap(), b"test image data");
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        let slot = cache.resolve_slot(&uri("https://example.com/none.png"));

        assert!(!cache.exists(&slot, None).await);
        assert!(cache.read(&slot).await.is_none());
    }

    #[tokio::test]
    async fn test_slots_are_distinct_per_uri() {
        let (cache, _temp) = create_test_cache(1024).await;
        let a = cache.resolve_slot(&uri("https://example.com/a.png"));
        let b = cache.resolve_slot(&uri("https://example.com/b.png"));
        assert_ne!(a, b);
        assert_eq!(a, cache.resolve_slot(&uri("https://example.com/a.png")));
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        let slot = cache.resolve_slot(&uri("https://example.com/old.png"));
        cache.put_bytes(&slot, b"stale").await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(!cache.exists(&slot, Some(Duration::from_millis(5))).await);
        assert!(cache.exists(&slot, Some(Duration::from_secs(3600))).await);
        assert!(cache.exists(&slot, None).await);
    }

    #[tokio::test]
    async fn test_partial_file_is_not_a_hit() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        let slot = cache.resolve_slot(&uri("https://example.com/p.png"));

        let partial = cache.begin_write(&slot).await;
        fs::write(&partial, b"half").await.unwrap();

        assert!(cache.is_writing(&slot));
        assert!(!cache.exists(&slot, None).await);

        cache.abort(&slot).await;
        assert!(!cache.is_writing(&slot));
        assert!(!partial.exists());
        assert!(!cache.exists(&slot, None).await);
    }

    #[tokio::test]
    async fn test_empty_commit_is_rejected() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        let slot = cache.resolve_slot(&uri("https://example.com/e.png"));

        let partial = cache.begin_write(&slot).await;
        fs::write(&partial, b"").await.unwrap();

        assert!(cache.commit(&slot).await.is_err());
        assert!(!cache.exists(&slot, None).await);
        assert!(!cache.is_writing(&slot));
    }

    #[tokio::test]
    async fn test_evict_and_clear() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        let a = cache.resolve_slot(&uri("https://example.com/a.png"));
        let b = cache.resolve_slot(&uri("https://example.com/b.png"));

        cache.put_bytes(&a, b"data1").await.unwrap();
        cache.put_bytes(&b, b"data2").await.unwrap();
        assert_eq!(cache.len(), 2);

        cache.evict(&a).await;
        assert!(!cache.exists(&a, None).await);
        assert_eq!(cache.len(), 1);

        cache.clear().await.unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.current_size(), 0);
    }

    #[tokio::test]
    async fn test_counters_track_overwrites() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        let a = cache.resolve_slot(&uri("https://example.com/a.png"));
        let b = cache.resolve_slot(&uri("https://example.com/b.png"));

        cache.put_bytes(&a, b"hello").await.unwrap();
        cache.put_bytes(&b, b"world!").await.unwrap();
        assert_eq!(cache.current_size(), 11);

        cache.put_bytes(&a, b"hey").await.unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.current_size(), 9);
    }

    #[tokio::test]
    async fn test_cleanup_evicts_least_recently_used() {
        let (cache, _temp) = create_test_cache(14).await;
        let a = cache.resolve_slot(&uri("https://example.com/a.png"));
        let b = cache.resolve_slot(&uri("https://example.com/b.png"));
        let c = cache.resolve_slot(&uri("https://example.com/c.png"));

        cache.put_bytes(&a, b"123456").await.unwrap();
        cache.put_bytes(&b, b"123456").await.unwrap();
        cache.touch(&a);
        cache.put_bytes(&c, b"123456").await.unwrap();

        assert!(cache.exists(&a, None).await);
        assert!(!cache.exists(&b, None).await);
        assert!(cache.exists(&c, None).await);
        assert_eq!(cache.current_size(), 12);
    }

    #[tokio::test]
    async fn test_cleanup_skips_slots_being_written() {
        let (cache, _temp) = create_test_cache(12).await;
        let a = cache.resolve_slot(&uri("https://example.com/a.png"));
        let b = cache.resolve_slot(&uri("https://example.com/b.png"));

        cache.put_bytes(&a, b"123456").await.unwrap();
        let _partial = cache.begin_write(&a).await;

        cache.put_bytes(&b, b"1234567890").await.unwrap();

        assert!(cache.exists(&a, None).await);
        assert!(!cache.exists(&b, None).await);
        cache.abort(&a).await;
    }

    #[tokio::test]
    async fn test_pinned_slot_survives_cleanup() {
        let (cache, _temp) = create_test_cache(16).await;
        let cache = Arc::new(cache);
        let big = cache.resolve_slot(&uri("https://example.com/big.png"));
        let small = cache.resolve_slot(&uri("https://example.com/small.png"));

        let pin = cache.pin(&big);
        let second = cache.pin(&big);
        cache.put_bytes(&big, &[7u8; 32]).await.unwrap();
        assert!(cache.exists(&big, None).await);

        drop(pin);
        assert!(cache.is_pinned(&big));
        drop(second);
        assert!(!cache.is_pinned(&big));

        cache.put_bytes(&small, b"1234").await.unwrap();
        assert!(!cache.exists(&big, None).await);
        assert!(cache.exists(&small, None).await);
    }

    #[tokio::test]
    async fn test_reopen_indexes_existing_and_drops_partials() {
        let temp_dir = TempDir::new().unwrap();
        let slot = {
            let cache = DiskCache::new(temp_dir.path().to_path_buf(), 1024)
                .await
                .unwrap();
            let slot = cache.resolve_slot(&uri("https://example.com/a.png"));
            cache.put_bytes(&slot, b"persisted").await.unwrap();
            let partial = cache.begin_write(&slot).await;
            fs::write(&partial, b"junk").await.unwrap();
            slot
        };

        let cache = DiskCache::new(temp_dir.path().to_path_buf(), 1024)
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.current_size(), 9);
        assert!(!DiskCache::partial_path(&slot).exists());
        assert_eq!(cache.read(&slot).await.unwrap(), b"persisted");
    }
}
