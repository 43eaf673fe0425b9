//! Request routing across the dispatch, network and local pools.
//!
//! Identifiers are parsed on the submitting thread, so an unknown scheme
//! fails without enqueuing anything. Everything else is classified on the
//! dispatch pool, which only consults caches and the download registry and
//! then hands the request to the network or local pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::chain::{
    DisplayJoinLoad, DownloadResponder, Exchange, LoadChain, LoadJoinDownload, LoadResponder,
};
use super::download_registry::{DownloadRegistry, Joiner};
use crate::application::delivery::Delivery;
use crate::application::requests::{
    DisplayRequest, DownloadRequest, LoadRequest, RequestHandle, RequestState,
};
use crate::domain::entities::{ImageStatus, RequestKind, RequestStatus, ResourceUri};
use crate::domain::errors::LoadError;
use crate::domain::ports::ImageCachePort;
use crate::infrastructure::cache::{DiskCache, MemoryImageCache};
use crate::infrastructure::decode::{DecodeSource, DecoderDispatch};
use crate::infrastructure::executor::Executors;

/// Components shared by every request in flight.
pub(crate) struct Pipeline {
    pub(crate) disk: Arc<DiskCache>,
    pub(crate) memory: Arc<MemoryImageCache>,
    pub(crate) registry: Arc<DownloadRegistry>,
    pub(crate) decoders: DecoderDispatch,
    pub(crate) executors: Executors,
    pub(crate) delivery: Delivery,
}

/// Routes submitted requests to the pools.
pub struct TaskDispatcher {
    pipeline: Arc<Pipeline>,
}

impl std::fmt::Debug for TaskDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDispatcher")
            .field("executors", &self.pipeline.executors)
            .finish_non_exhaustive()
    }
}

impl TaskDispatcher {
    pub(crate) fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    pub(crate) fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    fn exchange(&self, uri: ResourceUri, state: Arc<RequestState>) -> Exchange {
        Exchange {
            uri,
            state,
            delivery: self.pipeline.delivery.clone(),
        }
    }

    /// Submits a download.
    pub fn submit_download(&self, request: DownloadRequest) -> RequestHandle {
        let handle = request.handle();
        let DownloadRequest {
            uri,
            options,
            listener,
            progress,
            state,
        } = request;

        let parsed = match ResourceUri::parse(&uri) {
            Ok(parsed) => parsed,
            Err(error) => {
                log_rejected(&state, &uri);
                self.pipeline.delivery.post(move || {
                    if state.finish(RequestStatus::Failed)
                        && let Some(listener) = listener
                    {
                        listener.on_failed(error);
                    }
                });
                return handle;
            }
        };

        let responder = Arc::new(DownloadResponder::new(
            self.exchange(parsed.clone(), state.clone()),
            listener,
            progress,
        ));
        if !parsed.is_network() {
            warn!(request = %state.id(), uri = %parsed, "Download of a local resource");
            responder.failed(LoadError::fetch(format!("not a network resource: {parsed}")));
            return handle;
        }

        let pipeline = self.pipeline.clone();
        let validity = options.disk_cache_validity;
        self.enqueue_dispatch(
            &state,
            classify_download(pipeline, parsed, state.clone(), validity, responder),
        );
        handle
    }

    /// Submits a load.
    pub fn submit_load(&self, request: LoadRequest) -> RequestHandle {
        let handle = request.handle();
        let LoadRequest {
            uri,
            options,
            listener,
            progress,
            state,
        } = request;

        let parsed = match ResourceUri::parse(&uri) {
            Ok(parsed) => parsed,
            Err(error) => {
                log_rejected(&state, &uri);
                self.pipeline.delivery.post(move || {
                    if state.finish(RequestStatus::Failed)
                        && let Some(listener) = listener
                    {
                        listener.on_failed(error);
                    }
                });
                return handle;
            }
        };

        let chain = LoadChain::new(
            self.pipeline.clone(),
            self.exchange(parsed, state.clone()),
            options,
            LoadResponder::Load(listener),
            progress,
        );
        self.enqueue_dispatch(&state, classify_load(self.pipeline.clone(), Arc::new(chain)));
        handle
    }

    /// Submits a display, binding it to its target first.
    ///
    /// Binding cancels whatever request the target was bound to before.
    pub fn submit_display(&self, request: DisplayRequest) -> RequestHandle {
        let handle = request.handle();
        let DisplayRequest {
            uri,
            options,
            target,
            listener,
            progress,
            state,
        } = request;
        target.bind(handle.clone());

        let parsed = match ResourceUri::parse(&uri) {
            Ok(parsed) => parsed,
            Err(error) => {
                log_rejected(&state, &uri);
                self.pipeline.delivery.post(move || {
                    if target.is_bound_to(state.id()) && state.finish(RequestStatus::Failed) {
                        target.set_status(ImageStatus::Failed(error.to_string()));
                        if let Some(listener) = listener {
                            listener.on_failed(error);
                        }
                    }
                });
                return handle;
            }
        };

        let chain = LoadChain::new(
            self.pipeline.clone(),
            self.exchange(parsed, state.clone()),
            options.load,
            LoadResponder::Display(DisplayJoinLoad::new(target, listener)),
            progress,
        );
        self.enqueue_dispatch(&state, classify_load(self.pipeline.clone(), Arc::new(chain)));
        handle
    }

    fn enqueue_dispatch<F>(&self, state: &RequestState, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.pipeline.executors.dispatch.execute(job) {
            debug!(request = %state.id(), "Dispatch pool stopped, request dropped");
        }
    }
}

fn log_rejected(state: &RequestState, uri: &str) {
    warn!(
        request = %state.id(),
        kind = %state.kind(),
        uri,
        "Unknown scheme, failing without dispatch"
    );
}

async fn classify_download(
    pipeline: Arc<Pipeline>,
    uri: ResourceUri,
    state: Arc<RequestState>,
    validity: Option<Duration>,
    responder: Arc<DownloadResponder>,
) {
    if state.is_canceled() {
        return;
    }
    let slot = pipeline.disk.resolve_slot(&uri);
    state.set_cache_file(slot.clone());
    state.advance(RequestStatus::Dispatched);

    if pipeline.disk.exists(&slot, validity).await && !pipeline.registry.is_in_flight(&slot) {
        debug!(request = %state.id(), uri = %uri, route = "local", "DOWNLOAD");
        let disk = pipeline.disk.clone();
        pipeline.executors.local.execute(async move {
            if state.is_canceled() {
                return;
            }
            disk.touch(&slot);
            responder.cached(slot);
        });
        return;
    }

    debug!(request = %state.id(), uri = %uri, route = "network", "DOWNLOAD");
    let registry = pipeline.registry.clone();
    let joiner = Joiner::new(state.clone(), responder);
    let Err(joiner) = registry.try_join(&slot, joiner) else {
        debug!(request = %state.id(), "Joined download in flight");
        return;
    };
    pipeline.executors.network.execute(async move {
        if state.is_canceled() {
            return;
        }
        registry.fetch(&uri, slot, validity, joiner).await;
    });
}

async fn classify_load(pipeline: Arc<Pipeline>, chain: Arc<LoadChain>) {
    let uri = chain.exchange().uri.clone();
    let state = chain.exchange().state.clone();
    if state.is_canceled() {
        return;
    }
    let kind = state.kind();

    if chain.options().enable_memory_cache
        && let Some(image) = pipeline.memory.get(&chain.signature()).await
    {
        debug!(request = %state.id(), uri = %uri, route = "memory", "{kind}");
        chain.cached(image);
        return;
    }
    state.advance(RequestStatus::Dispatched);

    if let Some(source) = DecodeSource::for_local(&uri) {
        debug!(request = %state.id(), uri = %uri, route = "local", "{kind}");
        pipeline.executors.local.execute(chain.decode(source, None));
        return;
    }

    let slot = pipeline.disk.resolve_slot(&uri);
    state.set_cache_file(slot.clone());
    let validity = chain.options().download.disk_cache_validity;

    let pin = pipeline.disk.pin(&slot);
    if pipeline.disk.exists(&slot, validity).await && !pipeline.registry.is_in_flight(&slot) {
        debug!(request = %state.id(), uri = %uri, route = "disk", "{kind}");
        pipeline.executors.local.execute(
            chain.decode(DecodeSource::CacheFile { slot, fresh: false }, Some(pin)),
        );
        return;
    }
    drop(pin);

    fetch_then_decode(&pipeline, chain, uri, slot, validity, kind);
}

fn fetch_then_decode(
    pipeline: &Arc<Pipeline>,
    chain: Arc<LoadChain>,
    uri: ResourceUri,
    slot: PathBuf,
    validity: Option<Duration>,
    kind: RequestKind,
) {
    let state = chain.exchange().state.clone();
    let joiner = Joiner::new(state.clone(), Arc::new(LoadJoinDownload(chain)));
    let Err(joiner) = pipeline.registry.try_join(&slot, joiner) else {
        debug!(request = %state.id(), uri = %uri, route = "joined", "{kind}");
        return;
    };

    debug!(request = %state.id(), uri = %uri, route = "network", "{kind}");
    let registry = pipeline.registry.clone();
    pipeline.executors.network.execute(async move {
        if state.is_canceled() {
            return;
        }
        registry.fetch(&uri, slot, validity, joiner).await;
    });
}
