//! Decoder dispatch from resolved byte sources to decoded images.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::domain::entities::{ImageSource, LoadOptions, ResourceUri, Scheme};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::{
    ContentResolverPort, EmbeddedResourcePort, ImageDecoderPort, join_within,
};
use crate::infrastructure::cache::DiskCache;

/// A resolved byte source ready to be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeSource {
    /// A disk cache slot filled by a download.
    CacheFile {
        /// Slot path.
        slot: PathBuf,
        /// True if the slot was filled by this request's own fetch.
        fresh: bool,
    },
    /// A file on the local filesystem.
    File(PathBuf),
    /// A file relative to the asset root.
    Asset(String),
    /// A content provider identifier.
    Content(ResourceUri),
    /// A named embedded resource.
    Embedded(String),
}

impl DecodeSource {
    /// Builds the source for a non-network identifier.
    ///
    /// Returns `None` for network schemes, which decode from a cache slot.
    #[must_use]
    pub fn for_local(uri: &ResourceUri) -> Option<Self> {
        match uri.scheme() {
            Scheme::Http | Scheme::Https => None,
            Scheme::File => Some(Self::File(PathBuf::from(uri.path()))),
            Scheme::Asset => Some(Self::Asset(uri.path().to_string())),
            Scheme::Content => Some(Self::Content(uri.clone())),
            Scheme::Embedded => Some(Self::Embedded(uri.path().to_string())),
        }
    }

    /// Where the bytes of this source came from.
    #[must_use]
    pub const fn origin(&self) -> ImageSource {
        match self {
            Self::CacheFile { fresh: true, .. } => ImageSource::Network,
            Self::CacheFile { fresh: false, .. } => ImageSource::DiskCache,
            _ => ImageSource::Local,
        }
    }

    /// The disk slot backing this source, if any.
    #[must_use]
    pub fn backing_slot(&self) -> Option<PathBuf> {
        match self {
            Self::CacheFile { slot, .. } => Some(slot.clone()),
            _ => None,
        }
    }
}

/// Decoder backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateDecoder;

impl ImageDecoderPort for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8], options: &LoadOptions) -> LoadResult<image::DynamicImage> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(options.process(decoded))
    }
}

/// Reads a [`DecodeSource`] and decodes it on a blocking thread.
pub struct DecoderDispatch {
    disk_cache: Arc<DiskCache>,
    decoder: Arc<dyn ImageDecoderPort>,
    content: Arc<dyn ContentResolverPort>,
    embedded: Arc<dyn EmbeddedResourcePort>,
    asset_root: PathBuf,
}

impl std::fmt::Debug for DecoderDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderDispatch")
            .field("asset_root", &self.asset_root)
            .finish_non_exhaustive()
    }
}

impl DecoderDispatch {
    /// Creates a dispatch over the given collaborators.
    #[must_use]
    pub fn new(
        disk_cache: Arc<DiskCache>,
        decoder: Arc<dyn ImageDecoderPort>,
        content: Arc<dyn ContentResolverPort>,
        embedded: Arc<dyn EmbeddedResourcePort>,
        asset_root: PathBuf,
    ) -> Self {
        Self {
            disk_cache,
            decoder,
            content,
            embedded,
            asset_root,
        }
    }

    /// Reads the raw bytes behind a source.
    ///
    /// # Errors
    /// Returns [`LoadError::Io`] if the source cannot be read.
    pub async fn read(&self, source: &DecodeSource) -> LoadResult<Bytes> {
        match source {
            DecodeSource::CacheFile { slot, .. } => self
                .disk_cache
                .read(slot)
                .await
                .map(Bytes::from)
                .ok_or_else(|| LoadError::io(format!("cache file missing: {}", slot.display()))),
            DecodeSource::File(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
            DecodeSource::Asset(name) => {
                let path = join_within(&self.asset_root, name)?;
                Ok(Bytes::from(tokio::fs::read(path).await?))
            }
            DecodeSource::Content(uri) => self.content.open(uri).await,
            DecodeSource::Embedded(name) => self
                .embedded
                .get(name)
                .ok_or_else(|| LoadError::io(format!("no embedded resource named {name}"))),
        }
    }

    /// Reads and decodes a source. Decoding runs via `spawn_blocking`.
    ///
    /// # Errors
    /// Returns [`LoadError::Io`] for unreadable sources and
    /// [`LoadError::Decode`] for bytes that are not a supported image.
    pub async fn decode(
        &self,
        source: &DecodeSource,
        options: &LoadOptions,
    ) -> LoadResult<image::DynamicImage> {
        let bytes = self.read(source).await?;
        let decoder = self.decoder.clone();
        let options = options.clone();

        let result = tokio::task::spawn_blocking(move || decoder.decode(&bytes, &options))
            .await
            .map_err(|e| LoadError::decode(format!("Decode task panicked: {e}")))?;

        match &result {
            Ok(img) => debug!(
                source = ?source,
                width = img.width(),
                height = img.height(),
                "Decoded image"
            ),
            Err(e) => warn!(source = ?source, error = %e, "Failed to decode image"),
        }
        result
    }
}
