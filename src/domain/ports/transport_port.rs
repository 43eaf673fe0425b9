//! Port for fetching network resources into disk cache slots.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::entities::{Progress, ResourceUri};
use crate::domain::errors::LoadResult;

/// Receives progress updates while a fetch is running.
pub type ProgressSink = dyn Fn(Progress) + Send + Sync;

/// Transport collaborator that writes the bytes of a network resource to a file.
#[async_trait]
pub trait TransportPort: Send + Sync {
    /// Fetches `uri` and writes its bytes to `destination`, reporting progress.
    /// Returns the number of bytes written.
    ///
    /// The destination is a scratch file; the caller commits it into the cache
    /// only after this returns `Ok`.
    async fn fetch(
        &self,
        uri: &ResourceUri,
        destination: &Path,
        progress: &ProgressSink,
    ) -> LoadResult<u64>;

    /// Returns true while a fetch is writing to `destination`.
    fn is_writing(&self, destination: &Path) -> bool;
}
