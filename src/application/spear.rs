//! The pipeline context object.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::delivery::Delivery;
use super::requests::{DisplayRequest, DownloadRequest, LoadRequest, RequestHandle};
use super::services::dispatcher::Pipeline;
use super::services::{DownloadRegistry, TaskDispatcher};
use crate::domain::entities::{DisplayOptions, ResourceUri};
use crate::domain::errors::LoadResult;
use crate::domain::ports::{
    ContentResolverPort, DirectoryContentResolver, EmbeddedResourcePort, EmbeddedResources,
    ImageCachePort, ImageDecoderPort, TransportPort,
};
use crate::infrastructure::cache::{CacheStats, DiskCache, MemoryImageCache};
use crate::infrastructure::config::SpearConfig;
use crate::infrastructure::decode::{DecoderDispatch, ImageCrateDecoder};
use crate::infrastructure::executor::{Executors, PoolStats};
use crate::infrastructure::transport::HttpTransport;
use crate::presentation::ImageTarget;

/// The external collaborators a pipeline reads bytes through.
pub struct Collaborators {
    /// Network transport.
    pub transport: Arc<dyn TransportPort>,
    /// Image decoder.
    pub decoder: Arc<dyn ImageDecoderPort>,
    /// `content://` resolver.
    pub content: Arc<dyn ContentResolverPort>,
    /// `embedded://` table.
    pub embedded: Arc<dyn EmbeddedResourcePort>,
}

impl Collaborators {
    /// Uses `transport` with the stock decoder and empty local tables.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn TransportPort>) -> Self {
        Self {
            transport,
            decoder: Arc::new(ImageCrateDecoder),
            content: Arc::new(DirectoryContentResolver::new()),
            embedded: Arc::new(EmbeddedResources::new()),
        }
    }

    /// Uses an HTTP transport configured from `config`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn http(config: &SpearConfig) -> LoadResult<Self> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new(
            config.timeout(),
        )?)))
    }
}

/// Activity counters of the three pools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Dispatch pool.
    pub dispatch: PoolStats,
    /// Network pool.
    pub network: PoolStats,
    /// Local pool.
    pub local: PoolStats,
}

/// Owns the caches, pools and download registry and accepts requests.
///
/// Construct one per application and share it. Callbacks run on the
/// [`Delivery`] passed in, drained by the caller's
/// [`DeliveryLoop`](super::DeliveryLoop).
pub struct Spear {
    dispatcher: TaskDispatcher,
    named_options: RwLock<HashMap<String, DisplayOptions>>,
}

impl std::fmt::Debug for Spear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spear")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl Spear {
    /// Creates a pipeline fetching over HTTP.
    ///
    /// # Errors
    /// Returns error if the disk cache directory or HTTP client cannot be
    /// set up.
    pub async fn new(config: &SpearConfig, delivery: Delivery) -> LoadResult<Self> {
        Self::with_collaborators(config, delivery, Collaborators::http(config)?).await
    }

    /// Creates a pipeline over the given collaborators.
    ///
    /// # Errors
    /// Returns error if the disk cache directory cannot be set up.
    pub async fn with_collaborators(
        config: &SpearConfig,
        delivery: Delivery,
        collaborators: Collaborators,
    ) -> LoadResult<Self> {
        let disk = Arc::new(
            DiskCache::new(config.effective_cache_dir(), config.disk_cache_bytes).await?,
        );
        let memory = Arc::new(MemoryImageCache::new(config.memory_cache_bytes));
        let registry = Arc::new(DownloadRegistry::new(
            collaborators.transport,
            disk.clone(),
        ));
        let decoders = DecoderDispatch::new(
            disk.clone(),
            collaborators.decoder,
            collaborators.content,
            collaborators.embedded,
            config.asset_root.clone(),
        );
        let executors = Executors::new(config.executor_config());

        info!(
            cache_dir = %disk.dir().display(),
            disk_bytes = config.disk_cache_bytes,
            memory_bytes = config.memory_cache_bytes,
            "Pipeline started"
        );

        let pipeline = Pipeline {
            disk,
            memory,
            registry,
            decoders,
            executors,
            delivery,
        };
        Ok(Self {
            dispatcher: TaskDispatcher::new(Arc::new(pipeline)),
            named_options: RwLock::new(HashMap::new()),
        })
    }

    fn pipeline(&self) -> &Pipeline {
        self.dispatcher.pipeline()
    }

    /// Fetches a network resource into the disk cache.
    pub fn download(&self, request: DownloadRequest) -> RequestHandle {
        self.dispatcher.submit_download(request)
    }

    /// Loads and decodes a resource.
    pub fn load(&self, request: LoadRequest) -> RequestHandle {
        self.dispatcher.submit_load(request)
    }

    /// Loads a resource into its target, canceling the target's previous
    /// request.
    pub fn display(&self, request: DisplayRequest) -> RequestHandle {
        self.dispatcher.submit_display(request)
    }

    /// Cancels the request bound to `target`. Returns true if one was running.
    ///
    /// A fetch the request owned keeps running for any other request joined
    /// to it and still fills the disk cache.
    pub fn cancel(&self, target: &ImageTarget) -> bool {
        let canceled = target.cancel();
        if canceled {
            debug!(
                in_flight = self.pipeline().registry.in_flight(),
                "Canceled target request"
            );
        }
        canceled
    }

    /// Stores display options under `name` for reuse.
    pub fn put_options(&self, name: impl Into<String>, options: impl Into<DisplayOptions>) {
        self.named_options.write().insert(name.into(), options.into());
    }

    /// Returns the display options stored under `name`.
    #[must_use]
    pub fn options(&self, name: &str) -> Option<DisplayOptions> {
        self.named_options.read().get(name).cloned()
    }

    /// Drops every decoded image held in memory.
    pub async fn clear_memory_cache(&self) {
        self.pipeline().memory.clear().await;
    }

    /// Deletes every disk cache slot and the memory entries decoded from them.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be read.
    pub async fn clear_disk_cache(&self) -> LoadResult<()> {
        let pipeline = self.pipeline();
        pipeline.disk.clear().await?;
        pipeline.memory.invalidate_disk_backed(None).await;
        Ok(())
    }

    /// Clears both caches.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be read.
    pub async fn clear_all_cache(&self) -> LoadResult<()> {
        self.clear_memory_cache().await;
        self.clear_disk_cache().await
    }

    /// Returns the disk cache file holding `uri`, if a valid one exists.
    pub async fn cache_file_for(&self, uri: &str) -> Option<PathBuf> {
        let uri = ResourceUri::parse(uri).ok()?;
        self.pipeline().disk.cache_file_for(&uri, None).await
    }

    /// Memory cache statistics.
    #[must_use]
    pub fn memory_cache_stats(&self) -> CacheStats {
        self.pipeline().memory.stats()
    }

    /// Bytes currently held in the disk cache.
    #[must_use]
    pub fn disk_cache_size(&self) -> u64 {
        self.pipeline().disk.current_size()
    }

    /// Activity counters of the pools.
    #[must_use]
    pub fn pool_stats(&self) -> PipelineStats {
        let executors = &self.pipeline().executors;
        PipelineStats {
            dispatch: executors.dispatch.stats(),
            network: executors.network.stats(),
            local: executors.local.stats(),
        }
    }

    /// Stops the pools. Queued requests are dropped without callbacks.
    pub fn shutdown(&self) {
        self.pipeline().executors.shutdown();
    }
}

impl Drop for Spear {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::DeliveryLoop;
    use crate::application::requests::recording::{Event, Recorder};
    use crate::domain::entities::{DownloadOptions, ImageSource, LoadOptions, RequestStatus};
    use crate::domain::errors::LoadError;
    use crate::domain::ports::mocks::MockTransport;
    use crate::infrastructure::config::{PoolConfig, PoolsConfig};
    use crate::infrastructure::decode::test_support::png_bytes;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;
    use tokio::time::{Instant, timeout};

    const A: &str = "https://example.com/a.png";
    const B: &str = "https://example.com/b.png";

    struct Harness {
        spear: Spear,
        events: DeliveryLoop,
        transport: Arc<MockTransport>,
        embedded: Arc<EmbeddedResources>,
        _dir: TempDir,
    }

    impl Harness {
        async fn new(transport: MockTransport) -> Self {
            Self::with_pools(transport, PoolsConfig::default()).await
        }

        async fn with_pools(transport: MockTransport, pools: PoolsConfig) -> Self {
            Self::with_config(transport, SpearConfig { pools, ..SpearConfig::default() }).await
        }

        async fn with_config(transport: MockTransport, config: SpearConfig) -> Self {
            let dir = TempDir::new().unwrap();
            let config = SpearConfig {
                cache_dir: Some(dir.path().join("cache")),
                asset_root: dir.path().to_path_buf(),
                ..config
            };
            let transport = Arc::new(transport);
            transport.serve(A, png_bytes(5, 5));
            transport.serve(B, png_bytes(7, 7));
            let embedded = Arc::new(EmbeddedResources::new());
            let collaborators = Collaborators {
                embedded: embedded.clone(),
                ..Collaborators::with_transport(transport.clone())
            };
            let (delivery, events) = Delivery::channel();
            let spear = Spear::with_collaborators(&config, delivery, collaborators)
                .await
                .unwrap();
            Self {
                spear,
                events,
                transport,
                embedded,
                _dir: dir,
            }
        }

        fn load(&self, uri: &str) -> (Arc<Recorder>, RequestHandle) {
            self.load_with(uri, LoadOptions::default())
        }

        fn load_with(&self, uri: &str, options: LoadOptions) -> (Arc<Recorder>, RequestHandle) {
            let recorder = Recorder::new();
            let handle = self.spear.load(
                LoadRequest::new(uri)
                    .options(options)
                    .listener(recorder.clone()),
            );
            (recorder, handle)
        }

        async fn drain_until(&mut self, mut done: impl FnMut() -> bool) {
            let deadline = Instant::now() + Duration::from_secs(5);
            while !done() {
                assert!(Instant::now() < deadline, "timed out waiting for callbacks");
                let _ = timeout(Duration::from_millis(10), self.events.next()).await;
            }
        }

        /// Runs callbacks until none arrive for a while.
        async fn settle(&mut self) {
            while let Ok(true) = timeout(Duration::from_millis(100), self.events.next()).await {}
        }
    }

    fn loaded(recorder: &Recorder) -> LoadedImageSummary {
        match recorder.events().last() {
            Some(Event::Loaded(image)) => LoadedImageSummary {
                width: image.image.width(),
                source: image.source,
            },
            other => panic!("expected a loaded image, got {other:?}"),
        }
    }

    #[derive(Debug, PartialEq, Eq)]
    struct LoadedImageSummary {
        width: u32,
        source: ImageSource,
    }

    #[tokio::test]
    async fn test_unknown_scheme_fails_without_any_pool_task() {
        let mut h = Harness::new(MockTransport::new()).await;
        let (recorder, handle) = h.load("ftp://example.com/a.png");

        h.drain_until(|| recorder.terminal_count() == 1).await;
        h.settle().await;

        assert!(matches!(
            &recorder.events()[..],
            [Event::Failed(LoadError::UnknownScheme { .. })]
        ));
        assert_eq!(handle.status(), RequestStatus::Failed);
        assert_eq!(h.spear.pool_stats(), PipelineStats::default());
    }

    #[tokio::test]
    async fn test_network_load_then_memory_then_disk() {
        let mut h = Harness::new(MockTransport::new()).await;

        let (first, handle) = h.load(A);
        h.drain_until(|| first.terminal_count() == 1).await;
        assert_eq!(
            loaded(&first),
            LoadedImageSummary { width: 5, source: ImageSource::Network }
        );
        let slot = handle.cache_file().unwrap();
        assert!(slot.exists());
        assert_eq!(h.spear.cache_file_for(A).await, Some(slot));

        let (second, _) = h.load(A);
        h.drain_until(|| second.terminal_count() == 1).await;
        assert_eq!(loaded(&second).source, ImageSource::MemoryCache);

        h.spear.clear_memory_cache().await;
        let (third, _) = h.load(A);
        h.drain_until(|| third.terminal_count() == 1).await;
        assert_eq!(loaded(&third).source, ImageSource::DiskCache);

        assert_eq!(h.transport.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_fetch() {
        let gate = Arc::new(Semaphore::new(0));
        let mut h = Harness::new(MockTransport::gated(gate.clone())).await;

        let requests: Vec<_> = (0..3).map(|_| h.load(A)).collect();
        let transport = h.transport.clone();
        h.drain_until(|| transport.fetch_count() == 1).await;
        h.settle().await;

        gate.add_permits(1);
        h.drain_until(|| requests.iter().all(|(r, _)| r.terminal_count() == 1))
            .await;

        assert_eq!(h.transport.fetch_count(), 1);
        for (recorder, _) in &requests {
            assert_eq!(loaded(recorder).width, 5);
        }
    }

    #[tokio::test]
    async fn test_canceled_joiner_gets_no_callbacks() {
        let gate = Arc::new(Semaphore::new(0));
        let mut h = Harness::new(MockTransport::gated(gate.clone())).await;

        let (owner, _) = h.load(A);
        let (joiner, joiner_handle) = h.load(A);
        let transport = h.transport.clone();
        h.drain_until(|| transport.fetch_count() == 1).await;
        h.settle().await;

        assert!(joiner_handle.cancel());
        gate.add_permits(1);
        h.drain_until(|| owner.terminal_count() == 1).await;
        h.settle().await;

        assert!(joiner.events().is_empty());
        assert_eq!(joiner_handle.status(), RequestStatus::Canceled);
        assert_eq!(h.transport.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_canceled_sole_owner_still_fills_disk_cache() {
        let gate = Arc::new(Semaphore::new(0));
        let mut h = Harness::new(MockTransport::gated(gate.clone())).await;

        let (recorder, handle) = h.load(A);
        let transport = h.transport.clone();
        h.drain_until(|| transport.fetch_count() == 1).await;

        handle.cancel();
        gate.add_permits(1);
        let spear = &h.spear;
        let deadline = Instant::now() + Duration::from_secs(5);
        while spear.cache_file_for(A).await.is_none() {
            assert!(Instant::now() < deadline, "slot never filled");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        h.settle().await;

        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_rebinding_suppresses_stale_result() {
        let gate = Arc::new(Semaphore::new(0));
        let mut h = Harness::new(MockTransport::gated(gate.clone())).await;
        h.embedded.insert("logo", png_bytes(3, 3));
        let target = ImageTarget::new();

        let stale = Recorder::new();
        let stale_handle = h.spear.display(
            DisplayRequest::new(A, &target).listener(stale.clone()),
        );
        let transport = h.transport.clone();
        h.drain_until(|| transport.fetch_count() == 1).await;

        let fresh = Recorder::new();
        h.spear.display(DisplayRequest::new("embedded://logo", &target).listener(fresh.clone()));
        h.drain_until(|| fresh.terminal_count() == 1).await;

        gate.add_permits(1);
        h.settle().await;

        assert!(stale.events().is_empty());
        assert_eq!(stale_handle.status(), RequestStatus::Canceled);
        assert_eq!(target.image().unwrap().width(), 3);
        assert!(target.status().is_ready());
    }

    #[tokio::test]
    async fn test_display_failure_marks_target() {
        let mut h = Harness::new(MockTransport::new()).await;
        let target = ImageTarget::new();
        let recorder = Recorder::new();

        h.spear.display(
            DisplayRequest::new("embedded://missing", &target).listener(recorder.clone()),
        );
        h.drain_until(|| recorder.terminal_count() == 1).await;

        assert!(target.status().is_failed());
        assert!(target.image().is_none());
        assert!(!h.spear.cancel(&target));
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let mut h = Harness::new(MockTransport::new()).await;
        let (first, _) = h.load(A);
        h.drain_until(|| first.terminal_count() == 1).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        let options = LoadOptions::default()
            .enable_memory_cache(false)
            .download(DownloadOptions::default().disk_cache_validity(Duration::from_millis(1)));
        let (second, _) = h.load_with(A, options);
        h.drain_until(|| second.terminal_count() == 1).await;

        assert_eq!(loaded(&second).source, ImageSource::Network);
        assert_eq!(h.transport.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_pool_overflow_keeps_most_recent() {
        let small = PoolConfig { workers: 1, queue: 4 };
        let pools = PoolsConfig {
            dispatch: small,
            network: small,
            local: small,
        };
        let mut h = Harness::with_pools(MockTransport::new(), pools).await;
        for i in 0..6 {
            h.embedded.insert(format!("e{i}"), png_bytes(2, 2));
        }

        let requests: Vec<_> = (0..6).map(|i| h.load(&format!("embedded://e{i}"))).collect();
        h.drain_until(|| requests[2..].iter().all(|(r, _)| r.terminal_count() == 1))
            .await;
        h.settle().await;

        assert!(requests[0].0.events().is_empty());
        assert!(requests[1].0.events().is_empty());
        assert_eq!(h.spear.pool_stats().dispatch.discarded, 2);
    }

    #[tokio::test]
    async fn test_termination_is_idempotent() {
        let mut h = Harness::new(MockTransport::new()).await;
        h.embedded.insert("logo", png_bytes(2, 2));

        let (done, done_handle) = h.load("embedded://logo");
        h.drain_until(|| done.terminal_count() == 1).await;
        assert!(!done_handle.cancel());
        assert_eq!(done_handle.status(), RequestStatus::Completed);

        let (canceled, canceled_handle) = h.load("embedded://logo");
        assert!(canceled_handle.cancel());
        assert!(!canceled_handle.cancel());
        h.settle().await;

        assert_eq!(done.terminal_count(), 1);
        assert!(canceled.events().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported() {
        let mut h = Harness::new(MockTransport::new()).await;
        let (recorder, handle) = h.load("https://example.com/missing.png");

        h.drain_until(|| recorder.terminal_count() == 1).await;

        assert!(matches!(&recorder.events()[..], [Event::Failed(LoadError::Fetch(_))]));
        assert_eq!(handle.status(), RequestStatus::Failed);
        assert!(h.spear.cache_file_for("https://example.com/missing.png").await.is_none());
    }

    #[tokio::test]
    async fn test_progress_precedes_completion() {
        let mut h = Harness::new(MockTransport::new()).await;
        let recorder = Recorder::new();
        h.spear.load(
            LoadRequest::new(B)
                .listener(recorder.clone())
                .progress(recorder.progress_callback()),
        );

        h.drain_until(|| recorder.terminal_count() == 1).await;

        let events = recorder.events();
        assert!(matches!(events.first(), Some(Event::Progress(_))));
        assert!(matches!(events.last(), Some(Event::Loaded(_))));
    }

    #[tokio::test]
    async fn test_download_then_cached_download() {
        let mut h = Harness::new(MockTransport::new()).await;

        let first = Recorder::new();
        h.spear.download(DownloadRequest::new(A).listener(first.clone()));
        h.drain_until(|| first.terminal_count() == 1).await;

        let second = Recorder::new();
        h.spear.download(DownloadRequest::new(A).listener(second.clone()));
        h.drain_until(|| second.terminal_count() == 1).await;

        let sources: Vec<_> = [&first, &second]
            .iter()
            .map(|r| match r.events().last() {
                Some(Event::Downloaded(result)) => {
                    assert!(result.cache_file.exists());
                    result.source
                }
                other => panic!("expected a download, got {other:?}"),
            })
            .collect();
        assert_eq!(sources, vec![ImageSource::Network, ImageSource::DiskCache]);
        assert_eq!(h.transport.fetch_count(), 1);
        assert_eq!(h.spear.pool_stats().local.submitted, 1);
    }

    #[tokio::test]
    async fn test_download_of_local_resource_fails() {
        let mut h = Harness::new(MockTransport::new()).await;
        let recorder = Recorder::new();
        h.spear
            .download(DownloadRequest::new("file:///tmp/a.png").listener(recorder.clone()));

        h.drain_until(|| recorder.terminal_count() == 1).await;

        assert!(matches!(&recorder.events()[..], [Event::Failed(LoadError::Fetch(_))]));
    }

    #[tokio::test]
    async fn test_disabled_disk_cache_removes_slot() {
        let mut h = Harness::new(MockTransport::new()).await;
        let options =
            LoadOptions::default().download(DownloadOptions::default().enable_disk_cache(false));
        let (recorder, _) = h.load_with(A, options);

        h.drain_until(|| recorder.terminal_count() == 1).await;

        assert_eq!(loaded(&recorder).source, ImageSource::Network);
        assert!(h.spear.cache_file_for(A).await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_disk_cache_with_joined_loads() {
        let gate = Arc::new(Semaphore::new(0));
        let mut h = Harness::new(MockTransport::gated(gate.clone())).await;
        let options =
            LoadOptions::default().download(DownloadOptions::default().enable_disk_cache(false));

        let requests: Vec<_> = (0..3).map(|_| h.load_with(A, options.clone())).collect();
        let transport = h.transport.clone();
        h.drain_until(|| transport.fetch_count() == 1).await;
        h.settle().await;

        gate.add_permits(1);
        h.drain_until(|| requests.iter().all(|(r, _)| r.terminal_count() == 1))
            .await;

        for (recorder, _) in &requests {
            assert_eq!(
                loaded(recorder),
                LoadedImageSummary { width: 5, source: ImageSource::Network }
            );
        }
        assert_eq!(h.transport.fetch_count(), 1);
        h.settle().await;
        assert!(h.spear.cache_file_for(A).await.is_none());
    }

    #[tokio::test]
    async fn test_cached_slot_being_refetched_is_joined() {
        let gate = Arc::new(Semaphore::new(1));
        let mut h = Harness::new(MockTransport::gated(gate.clone())).await;
        let (first, _) = h.load(A);
        h.drain_until(|| first.terminal_count() == 1).await;
        assert!(h.spear.cache_file_for(A).await.is_some());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let expiring = LoadOptions::default()
            .enable_memory_cache(false)
            .download(DownloadOptions::default().disk_cache_validity(Duration::from_millis(1)));
        let (refetch, _) = h.load_with(A, expiring);
        let transport = h.transport.clone();
        h.drain_until(|| transport.fetch_count() == 2).await;

        let (joined, _) = h.load_with(A, LoadOptions::default().enable_memory_cache(false));
        h.settle().await;
        assert!(joined.events().is_empty());
        assert_eq!(h.spear.pool_stats().local.submitted, 1);

        gate.add_permits(1);
        h.drain_until(|| refetch.terminal_count() == 1 && joined.terminal_count() == 1)
            .await;

        assert_eq!(loaded(&refetch).source, ImageSource::Network);
        assert_eq!(loaded(&joined).source, ImageSource::Network);
        assert_eq!(h.transport.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_larger_than_disk_cache_still_loads() {
        let config = SpearConfig {
            disk_cache_bytes: 16,
            ..SpearConfig::default()
        };
        let mut h = Harness::with_config(MockTransport::new(), config).await;
        let (recorder, _) = h.load(A);

        h.drain_until(|| recorder.terminal_count() == 1).await;

        assert_eq!(
            loaded(&recorder),
            LoadedImageSummary { width: 5, source: ImageSource::Network }
        );
    }

    #[tokio::test]
    async fn test_clear_disk_cache_drops_disk_backed_memory() {
        let mut h = Harness::new(MockTransport::new()).await;
        h.embedded.insert("logo", png_bytes(2, 2));
        let (network, _) = h.load(A);
        let (local, _) = h.load("embedded://logo");
        h.drain_until(|| network.terminal_count() == 1 && local.terminal_count() == 1)
            .await;
        assert_eq!(h.spear.memory_cache_stats().size, 2);

        h.spear.clear_disk_cache().await.unwrap();

        assert!(h.spear.cache_file_for(A).await.is_none());
        assert_eq!(h.spear.memory_cache_stats().size, 1);
        assert_eq!(h.spear.disk_cache_size(), 0);
    }

    #[tokio::test]
    async fn test_named_options() {
        let h = Harness::new(MockTransport::new()).await;
        h.spear
            .put_options("thumb", LoadOptions::default().max_size(64, 64));

        let options = h.spear.options("thumb").unwrap();
        assert_eq!(options.load.max_size.unwrap().width, 64);
        assert!(h.spear.options("missing").is_none());
    }
}
