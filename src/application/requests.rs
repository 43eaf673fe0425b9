//! Request values, listeners and the shared per-request state.
//!
//! A [`DisplayRequest`] holds [`DisplayOptions`] which hold [`LoadOptions`],
//! which in turn hold the [`DownloadOptions`] used when the source is on the
//! network.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::domain::entities::{
    DisplayOptions, DownloadOptions, ImageSource, LoadOptions, LoadedImage, Progress, RequestId,
    RequestKind, RequestStatus, ResourceUri,
};
use crate::domain::errors::LoadError;
use crate::presentation::ImageTarget;

/// Progress callback invoked on the delivery context.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Result of a completed download.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// The fetched resource.
    pub uri: ResourceUri,
    /// Disk cache slot holding the bytes.
    pub cache_file: PathBuf,
    /// `Network` for a fresh fetch, `DiskCache` for an existing entry.
    pub source: ImageSource,
}

/// Callbacks for a download request. Invoked on the delivery context.
pub trait DownloadListener: Send + Sync {
    /// The bytes are in the disk cache.
    fn on_completed(&self, result: DownloadResult);
    /// The download failed.
    fn on_failed(&self, error: LoadError);
}

/// Callbacks for a load request. Invoked on the delivery context.
pub trait LoadListener: Send + Sync {
    /// The image was decoded.
    fn on_completed(&self, image: LoadedImage);
    /// Loading failed.
    fn on_failed(&self, error: LoadError);
}

/// Callbacks for a display request. Invoked on the delivery context, only
/// while the request is still bound to its target.
pub trait DisplayListener: Send + Sync {
    /// The image was delivered into the target.
    fn on_completed(&self, image: LoadedImage);
    /// Loading failed.
    fn on_failed(&self, error: LoadError);
}

/// Shared lifecycle state of one request.
///
/// Cancellation is monotonic and the first terminal transition wins, so at
/// most one terminal callback is ever delivered.
#[derive(Debug)]
pub struct RequestState {
    id: RequestId,
    kind: RequestKind,
    canceled: AtomicBool,
    status: Mutex<RequestStatus>,
    cache_file: OnceLock<PathBuf>,
}

impl RequestState {
    fn new(kind: RequestKind) -> Self {
        Self {
            id: RequestId::new(),
            kind,
            canceled: AtomicBool::new(false),
            status: Mutex::new(RequestStatus::Created),
            cache_file: OnceLock::new(),
        }
    }

    /// Returns the request id.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Returns the request kind.
    #[must_use]
    pub const fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> RequestStatus {
        *self.status.lock()
    }

    /// Returns true once canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Cancels the request. Returns false if it had already terminated.
    pub fn cancel(&self) -> bool {
        let mut status = self.status.lock();
        if status.is_terminal() {
            return false;
        }
        *status = RequestStatus::Canceled;
        self.canceled.store(true, Ordering::Release);
        true
    }

    /// Moves to a non-terminal status. Ignored once terminal.
    pub(crate) fn advance(&self, next: RequestStatus) {
        debug_assert!(!next.is_terminal());
        let mut status = self.status.lock();
        if !status.is_terminal() {
            *status = next;
        }
    }

    /// Enters a terminal status. Returns true only for the first transition,
    /// which is the caller's licence to invoke the terminal callback.
    pub(crate) fn finish(&self, terminal: RequestStatus) -> bool {
        debug_assert!(terminal.is_terminal());
        let mut status = self.status.lock();
        if status.is_terminal() {
            return false;
        }
        *status = terminal;
        true
    }

    /// Returns the resolved cache file, if any.
    #[must_use]
    pub fn cache_file(&self) -> Option<&Path> {
        self.cache_file.get().map(PathBuf::as_path)
    }

    /// Records the resolved cache file. Never reassigned once set.
    pub(crate) fn set_cache_file(&self, path: PathBuf) {
        let _ = self.cache_file.set(path);
    }
}

/// Caller-side handle to a submitted request.
#[derive(Debug, Clone)]
pub struct RequestHandle(pub(crate) Arc<RequestState>);

impl RequestHandle {
    /// Returns the request id.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.0.id()
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.0.status()
    }

    /// Returns true once canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.0.is_canceled()
    }

    /// Cancels the request; no callback fires afterwards.
    pub fn cancel(&self) -> bool {
        self.0.cancel()
    }

    /// Returns the resolved cache file, if any.
    #[must_use]
    pub fn cache_file(&self) -> Option<PathBuf> {
        self.0.cache_file().map(Path::to_path_buf)
    }
}

/// Fetch a network resource into the disk cache.
pub struct DownloadRequest {
    pub(crate) uri: String,
    pub(crate) options: DownloadOptions,
    pub(crate) listener: Option<Arc<dyn DownloadListener>>,
    pub(crate) progress: Option<ProgressCallback>,
    pub(crate) state: Arc<RequestState>,
}

impl DownloadRequest {
    /// Creates a request for `uri` with default options.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            options: DownloadOptions::default(),
            listener: None,
            progress: None,
            state: Arc::new(RequestState::new(RequestKind::Download)),
        }
    }

    /// Sets the options.
    #[must_use]
    pub fn options(mut self, options: DownloadOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the listener.
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn DownloadListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the progress callback.
    #[must_use]
    pub fn progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Returns a handle to this request.
    #[must_use]
    pub fn handle(&self) -> RequestHandle {
        RequestHandle(self.state.clone())
    }
}

/// Fetch (if needed) and decode a resource.
pub struct LoadRequest {
    pub(crate) uri: String,
    pub(crate) options: LoadOptions,
    pub(crate) listener: Option<Arc<dyn LoadListener>>,
    pub(crate) progress: Option<ProgressCallback>,
    pub(crate) state: Arc<RequestState>,
}

impl LoadRequest {
    /// Creates a request for `uri` with default options.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            options: LoadOptions::default(),
            listener: None,
            progress: None,
            state: Arc::new(RequestState::new(RequestKind::Load)),
        }
    }

    /// Sets the options.
    #[must_use]
    pub fn options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the listener.
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn LoadListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the progress callback.
    #[must_use]
    pub fn progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Returns a handle to this request.
    #[must_use]
    pub fn handle(&self) -> RequestHandle {
        RequestHandle(self.state.clone())
    }
}

/// Load a resource and deliver it into a consumption target.
pub struct DisplayRequest {
    pub(crate) uri: String,
    pub(crate) options: DisplayOptions,
    pub(crate) target: ImageTarget,
    pub(crate) listener: Option<Arc<dyn DisplayListener>>,
    pub(crate) progress: Option<ProgressCallback>,
    pub(crate) state: Arc<RequestState>,
}

impl DisplayRequest {
    /// Creates a request delivering `uri` into `target`.
    #[must_use]
    pub fn new(uri: impl Into<String>, target: &ImageTarget) -> Self {
        Self {
            uri: uri.into(),
            options: DisplayOptions::default(),
            target: target.clone(),
            listener: None,
            progress: None,
            state: Arc::new(RequestState::new(RequestKind::Display)),
        }
    }

    /// Sets the options.
    #[must_use]
    pub fn options(mut self, options: impl Into<DisplayOptions>) -> Self {
        self.options = options.into();
        self
    }

    /// Sets the listener.
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn DisplayListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the progress callback.
    #[must_use]
    pub fn progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Returns a handle to this request.
    #[must_use]
    pub fn handle(&self) -> RequestHandle {
        RequestHandle(self.state.clone())
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;

    /// A terminal or progress event captured by [`Recorder`].
    #[derive(Debug, Clone)]
    pub enum Event {
        Progress(Progress),
        Downloaded(DownloadResult),
        Loaded(LoadedImage),
        Failed(LoadError),
    }

    /// Listener that records every callback for assertions.
    #[derive(Default)]
    pub struct Recorder {
        events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn events(&self) -> Vec<Event> {
            self.events.lock().clone()
        }

        pub fn terminal_count(&self) -> usize {
            self.events
                .lock()
                .iter()
                .filter(|e| !matches!(e, Event::Progress(_)))
                .count()
        }

        pub fn progress_callback(self: &Arc<Self>) -> ProgressCallback {
            let this = self.clone();
            Arc::new(move |p| this.events.lock().push(Event::Progress(p)))
        }
    }

    impl DownloadListener for Recorder {
        fn on_completed(&self, result: DownloadResult) {
            self.events.lock().push(Event::Downloaded(result));
        }
        fn on_failed(&self, error: LoadError) {
            self.events.lock().push(Event::Failed(error));
        }
    }

    impl LoadListener for Recorder {
        fn on_completed(&self, image: LoadedImage) {
            self.events.lock().push(Event::Loaded(image));
        }
        fn on_failed(&self, error: LoadError) {
            self.events.lock().push(Event::Failed(error));
        }
    }

    impl DisplayListener for Recorder {
        fn on_completed(&self, image: LoadedImage) {
            self.events.lock().push(Event::Loaded(image));
        }
        fn on_failed(&self, error: LoadError) {
            self.events.lock().push(Event::Failed(error));
        }
    }
}
