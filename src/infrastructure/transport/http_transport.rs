//! HTTP transport writing response bodies into cache scratch files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

use crate::domain::entities::{Progress, ResourceUri};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::{ProgressSink, TransportPort};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// `reqwest`-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
    writing: Mutex<HashSet<PathBuf>>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Creates a transport with the given request timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> LoadResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::fetch(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client))
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            writing: Mutex::new(HashSet::new()),
        }
    }

    async fn download(
        &self,
        uri: &ResourceUri,
        destination: &Path,
        progress: &ProgressSink,
    ) -> LoadResult<u64> {
        let mut response = self
            .client
            .get(uri.as_str())
            .send()
            .await
            .map_err(|e| LoadError::fetch(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(LoadError::fetch(format!(
                "HTTP {}: {}",
                response.status(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        let total = response.content_length();
        let mut file = fs::File::create(destination)
            .await
            .map_err(|e| LoadError::io(format!("Failed to create download file: {e}")))?;

        let mut completed = 0u64;
        progress(Progress::new(completed, total));
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| LoadError::fetch(format!("Failed to read body: {e}")))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| LoadError::io(format!("Failed to write download file: {e}")))?;
            completed += chunk.len() as u64;
            progress(Progress::new(completed, total));
        }

        file.flush()
            .await
            .map_err(|e| LoadError::io(format!("Failed to flush download file: {e}")))?;

        if let Some(expected) = total
            && expected != completed
        {
            return Err(LoadError::fetch(format!(
                "Truncated body: {completed} of {expected} bytes"
            )));
        }

        Ok(completed)
    }
}

#[async_trait]
impl TransportPort for HttpTransport {
    async fn fetch(
        &self,
        uri: &ResourceUri,
        destination: &Path,
        progress: &ProgressSink,
    ) -> LoadResult<u64> {
        if !uri.is_network() {
            return Err(LoadError::fetch(format!("Not a network resource: {uri}")));
        }

        self.writing.lock().insert(destination.to_path_buf());
        debug!(uri = %uri, "Downloading resource");
        let result = self.download(uri, destination, progress).await;
        self.writing.lock().remove(destination);

        match &result {
            Ok(bytes) => trace!(uri = %uri, bytes, "Download finished"),
            Err(e) => debug!(uri = %uri, error = %e, "Download failed"),
        }
        result
    }

    fn is_writing(&self, destination: &Path) -> bool {
        self.writing.lock().contains(destination)
    }
}
