//! Decoded image values and their loading status.

use std::sync::Arc;

use super::uri::ResourceUri;

/// Decoded in-memory image shared between caches and targets.
pub type SharedImage = Arc<image::DynamicImage>;

/// Returns the number of pixel bytes held by a decoded image.
#[must_use]
pub fn image_bytes(image: &image::DynamicImage) -> usize {
    image.as_bytes().len()
}

/// Status of an image in the loading pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImageStatus {
    /// Image loading has not started.
    #[default]
    NotStarted,
    /// Image is being downloaded from the network.
    Downloading,
    /// Image is being decoded (CPU-intensive).
    Decoding,
    /// Image is fully loaded and ready for display.
    Ready,
    /// Image loading failed with an error message.
    Failed(String),
}

impl ImageStatus {
    /// Returns true if the image is ready for rendering.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns true if the image is currently being loaded.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Downloading | Self::Decoding)
    }

    /// Returns true if loading failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns true if loading hasn't started yet.
    #[must_use]
    pub const fn is_not_started(&self) -> bool {
        matches!(self, Self::NotStarted)
    }
}

/// Where an image was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Loaded from in-memory LRU cache.
    MemoryCache,
    /// Decoded from an existing disk cache slot.
    DiskCache,
    /// Downloaded from network, then decoded.
    Network,
    /// Read from a local file, asset, content provider or embedded resource.
    Local,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryCache => write!(f, "memory"),
            Self::DiskCache => write!(f, "disk"),
            Self::Network => write!(f, "network"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// A successfully loaded image.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// The requested resource.
    pub uri: ResourceUri,
    /// The decoded image.
    pub image: SharedImage,
    /// Where the bytes came from.
    pub source: ImageSource,
}
