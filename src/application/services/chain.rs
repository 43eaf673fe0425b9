//! The Download → Load → Display request chain.
//!
//! A load that needs bytes from the network joins a fetch through
//! [`LoadJoinDownload`], which turns the fetch outcome into a decode on the
//! local pool. A display is a load whose results are translated by
//! [`DisplayJoinLoad`] into updates of its target. Every listener call is
//! posted to the delivery context and re-checks cancellation there.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, trace};

use super::dispatcher::Pipeline;
use super::download_registry::{FetchOutcome, FlightListener};
use crate::application::delivery::Delivery;
use crate::application::requests::{
    DisplayListener, DownloadListener, DownloadResult, LoadListener, ProgressCallback,
    RequestState,
};
use crate::domain::entities::{
    ImageSource, ImageStatus, LoadOptions, LoadedImage, Progress, RequestStatus, ResourceUri,
    SharedImage,
};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::ImageCachePort;
use crate::infrastructure::cache::SlotPin;
use crate::infrastructure::decode::DecodeSource;
use crate::presentation::ImageTarget;

/// A submitted request as it travels through the pools.
#[derive(Clone)]
pub(crate) struct Exchange {
    pub uri: ResourceUri,
    pub state: Arc<RequestState>,
    pub delivery: Delivery,
}

impl Exchange {
    fn post_progress(&self, progress: Progress, callback: Option<ProgressCallback>) {
        let Some(callback) = callback else {
            return;
        };
        let state = self.state.clone();
        self.delivery.post(move || {
            if !state.status().is_terminal() {
                callback(progress);
            }
        });
    }
}

/// Forwards fetch events to a download request's listener.
pub(crate) struct DownloadResponder {
    exchange: Exchange,
    listener: Option<Arc<dyn DownloadListener>>,
    progress: Option<ProgressCallback>,
}

impl DownloadResponder {
    pub(crate) fn new(
        exchange: Exchange,
        listener: Option<Arc<dyn DownloadListener>>,
        progress: Option<ProgressCallback>,
    ) -> Self {
        Self {
            exchange,
            listener,
            progress,
        }
    }

    /// Reports a slot that already held a valid entry.
    pub(crate) fn cached(&self, slot: PathBuf) {
        self.completed(slot, ImageSource::DiskCache);
    }

    fn completed(&self, slot: PathBuf, source: ImageSource) {
        let result = DownloadResult {
            uri: self.exchange.uri.clone(),
            cache_file: slot,
            source,
        };
        let state = self.exchange.state.clone();
        let listener = self.listener.clone();
        self.exchange.delivery.post(move || {
            if state.finish(RequestStatus::Completed)
                && let Some(listener) = listener
            {
                listener.on_completed(result);
            }
        });
    }

    pub(crate) fn failed(&self, error: LoadError) {
        let state = self.exchange.state.clone();
        let listener = self.listener.clone();
        self.exchange.delivery.post(move || {
            if state.finish(RequestStatus::Failed)
                && let Some(listener) = listener
            {
                listener.on_failed(error);
            }
        });
    }
}

impl FlightListener for DownloadResponder {
    fn on_progress(&self, progress: Progress) {
        self.exchange.state.advance(RequestStatus::Downloading);
        self.exchange.post_progress(progress, self.progress.clone());
    }

    fn on_finished(&self, outcome: &LoadResult<FetchOutcome>, _pin: Option<SlotPin>) {
        match outcome {
            Ok(outcome) => {
                let source = if outcome.fresh {
                    ImageSource::Network
                } else {
                    ImageSource::DiskCache
                };
                self.completed(outcome.slot.clone(), source);
            }
            Err(e) => self.failed(e.clone()),
        }
    }
}

/// Translates load events into updates of a bound target.
pub(crate) struct DisplayJoinLoad {
    target: ImageTarget,
    listener: Option<Arc<dyn DisplayListener>>,
}

impl DisplayJoinLoad {
    pub(crate) fn new(target: ImageTarget, listener: Option<Arc<dyn DisplayListener>>) -> Self {
        Self { target, listener }
    }
}

/// Who receives the result of a load.
pub(crate) enum LoadResponder {
    Load(Option<Arc<dyn LoadListener>>),
    Display(DisplayJoinLoad),
}

/// A load request plus everything needed to finish it.
pub(crate) struct LoadChain {
    pipeline: Arc<Pipeline>,
    exchange: Exchange,
    options: LoadOptions,
    responder: LoadResponder,
    progress: Option<ProgressCallback>,
}

impl LoadChain {
    pub(crate) fn new(
        pipeline: Arc<Pipeline>,
        exchange: Exchange,
        options: LoadOptions,
        responder: LoadResponder,
        progress: Option<ProgressCallback>,
    ) -> Self {
        Self {
            pipeline,
            exchange,
            options,
            responder,
            progress,
        }
    }

    pub(crate) fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    pub(crate) fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Memory cache key for this load.
    pub(crate) fn signature(&self) -> String {
        self.options.signature(&self.exchange.uri)
    }

    /// Moves a display target to `status` while the request is still live.
    fn post_target_status(&self, status: ImageStatus) {
        if let LoadResponder::Display(display) = &self.responder {
            let target = display.target.clone();
            let state = self.exchange.state.clone();
            self.exchange.delivery.post(move || {
                if !state.status().is_terminal() && target.is_bound_to(state.id()) {
                    target.set_status(status);
                }
            });
        }
    }

    pub(crate) fn progress(&self, progress: Progress) {
        self.exchange.state.advance(RequestStatus::Downloading);
        self.post_target_status(ImageStatus::Downloading);
        self.exchange.post_progress(progress, self.progress.clone());
    }

    pub(crate) fn completed(&self, image: LoadedImage) {
        let state = self.exchange.state.clone();
        match &self.responder {
            LoadResponder::Load(listener) => {
                let listener = listener.clone();
                self.exchange.delivery.post(move || {
                    if state.finish(RequestStatus::Completed)
                        && let Some(listener) = listener
                    {
                        listener.on_completed(image);
                    }
                });
            }
            LoadResponder::Display(display) => {
                let target = display.target.clone();
                let listener = display.listener.clone();
                self.exchange.delivery.post(move || {
                    if !target.is_bound_to(state.id()) {
                        trace!(request = %state.id(), "Target rebound, dropping result");
                        return;
                    }
                    if state.finish(RequestStatus::Completed) {
                        target.set_image(image.image.clone());
                        if let Some(listener) = listener {
                            listener.on_completed(image);
                        }
                    }
                });
            }
        }
    }

    pub(crate) fn failed(&self, error: LoadError) {
        let state = self.exchange.state.clone();
        match &self.responder {
            LoadResponder::Load(listener) => {
                let listener = listener.clone();
                self.exchange.delivery.post(move || {
                    if state.finish(RequestStatus::Failed)
                        && let Some(listener) = listener
                    {
                        listener.on_failed(error);
                    }
                });
            }
            LoadResponder::Display(display) => {
                let target = display.target.clone();
                let listener = display.listener.clone();
                self.exchange.delivery.post(move || {
                    if !target.is_bound_to(state.id()) {
                        trace!(request = %state.id(), "Target rebound, dropping failure");
                        return;
                    }
                    if state.finish(RequestStatus::Failed) {
                        target.set_status(ImageStatus::Failed(error.to_string()));
                        if let Some(listener) = listener {
                            listener.on_failed(error);
                        }
                    }
                });
            }
        }
    }

    /// Reports a memory cache hit.
    pub(crate) fn cached(&self, image: SharedImage) {
        self.completed(LoadedImage {
            uri: self.exchange.uri.clone(),
            image,
            source: ImageSource::MemoryCache,
        });
    }

    /// Reads and decodes `source`, then reports the result.
    ///
    /// Runs on the local pool. A request canceled before this point is
    /// dropped without decoding. `pin` keeps a cache slot source on disk
    /// until this decode is done with it.
    pub(crate) async fn decode(self: Arc<Self>, source: DecodeSource, pin: Option<SlotPin>) {
        let state = &self.exchange.state;
        if state.is_canceled() {
            trace!(request = %state.id(), "Skipping decode of canceled request");
            self.release(&source, pin).await;
            return;
        }
        state.advance(RequestStatus::Decoding);
        self.post_target_status(ImageStatus::Decoding);

        let pipeline = &self.pipeline;
        match pipeline.decoders.decode(&source, &self.options).await {
            Ok(image) => {
                let image: SharedImage = Arc::new(image);
                if self.options.enable_memory_cache {
                    let backing = if self.discards(&source) {
                        None
                    } else {
                        source.backing_slot()
                    };
                    pipeline
                        .memory
                        .put(self.signature(), image.clone(), backing)
                        .await;
                }

                self.release(&source, pin).await;
                self.completed(LoadedImage {
                    uri: self.exchange.uri.clone(),
                    image,
                    source: source.origin(),
                });
            }
            Err(e) => self.failed(e),
        }
    }

    /// True if `source` is a slot this load fetched but should not keep.
    fn discards(&self, source: &DecodeSource) -> bool {
        matches!(source, DecodeSource::CacheFile { fresh: true, .. })
            && !self.options.download.enable_disk_cache
    }

    /// Drops this load's pin. The last reader of a slot that should not
    /// persist removes it.
    async fn release(&self, source: &DecodeSource, pin: Option<SlotPin>) {
        drop(pin);
        if let DecodeSource::CacheFile { slot, .. } = source
            && self.discards(source)
            && !self.pipeline.disk.is_pinned(slot)
            && !self.pipeline.registry.is_in_flight(slot)
        {
            debug!(uri = %self.exchange.uri, "Disk cache disabled, removing slot");
            self.pipeline.disk.evict(slot).await;
        }
    }
}

/// Joins a load to a fetch and decodes the slot once it is filled.
pub(crate) struct LoadJoinDownload(pub(crate) Arc<LoadChain>);

impl FlightListener for LoadJoinDownload {
    fn on_progress(&self, progress: Progress) {
        self.0.progress(progress);
    }

    fn on_finished(&self, outcome: &LoadResult<FetchOutcome>, pin: Option<SlotPin>) {
        match outcome {
            Ok(outcome) => {
                let chain = self.0.clone();
                let source = DecodeSource::CacheFile {
                    slot: outcome.slot.clone(),
                    fresh: outcome.fresh,
                };
                if !self.0.pipeline.executors.local.execute(chain.decode(source, pin)) {
                    self.0.failed(LoadError::Canceled);
                }
            }
            Err(e) => self.0.failed(e.clone()),
        }
    }
}
