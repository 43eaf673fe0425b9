//! Presentation layer binding requests to consumption targets.

/// Target binding.
pub mod binding;

pub use binding::ImageTarget;
