//! Application layer with requests, the delivery context and pipeline services.

/// Callback delivery context.
pub mod delivery;
/// Request values and listeners.
pub mod requests;
/// Registry, dispatcher and request chain.
pub mod services;
/// Pipeline context object.
pub mod spear;

pub use delivery::{Delivery, DeliveryLoop};
pub use requests::{
    DisplayListener, DisplayRequest, DownloadListener, DownloadRequest, DownloadResult,
    LoadListener, LoadRequest, ProgressCallback, RequestHandle, RequestState,
};
pub use spear::{Collaborators, PipelineStats, Spear};
