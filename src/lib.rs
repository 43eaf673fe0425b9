//! Spear - asynchronous image loading with disk and memory caching.
//!
//! This crate fetches resources from the network and local sources, keeps
//! fetched bytes in a disk cache and decoded images in a memory cache, and
//! delivers results to listeners and display targets on a caller-owned
//! delivery context.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing requests, delivery and pipeline services.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing caches, pools and I/O adapters.
pub mod infrastructure;
/// Presentation layer containing consumption-target binding.
pub mod presentation;

pub use application::{
    Delivery, DeliveryLoop, DisplayRequest, DownloadRequest, LoadRequest, RequestHandle, Spear,
};
pub use domain::{LoadError, LoadResult};
pub use presentation::ImageTarget;

/// Current version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = "spear";
