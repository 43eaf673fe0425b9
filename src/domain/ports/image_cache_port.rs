//! Port definition for decoded image caching.

use std::path::PathBuf;

use crate::domain::entities::SharedImage;

/// Port for decoded-image caching keyed by memory signature.
/// Implementations must be thread-safe.
#[async_trait::async_trait]
pub trait ImageCachePort: Send + Sync {
    /// Attempts to get an image from the cache.
    /// Returns None if not cached.
    async fn get(&self, key: &str) -> Option<SharedImage>;

    /// Stores an image in the cache. `backing` names the disk slot the image
    /// was decoded from, if any.
    async fn put(&self, key: String, image: SharedImage, backing: Option<PathBuf>);

    /// Removes an image from the cache.
    async fn evict(&self, key: &str);

    /// Drops every entry decoded from a disk slot, or only those decoded
    /// from `slot` when given.
    async fn invalidate_disk_backed(&self, slot: Option<&std::path::Path>);

    /// Returns the current number of cached images.
    fn len(&self) -> usize;

    /// Returns true if the cache is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all images from the cache.
    async fn clear(&self);
}
