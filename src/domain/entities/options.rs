//! Per-request download, load and display options.

use std::fmt::Write as _;
use std::time::Duration;

use image::DynamicImage;
use image::imageops::FilterType;

use super::uri::ResourceUri;

/// Target dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageSize {
    /// Creates a new size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A decode-time processing step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageProcessor {
    /// Scales to cover the size, then crops the centre.
    CenterCrop(ImageSize),
    /// Converts to grayscale.
    Grayscale,
    /// Gaussian blur with the given sigma.
    Blur(f32),
    /// Rotates 90 degrees clockwise.
    Rotate90,
}

impl ImageProcessor {
    /// Applies this step to a decoded image.
    #[must_use]
    pub fn apply(&self, image: DynamicImage) -> DynamicImage {
        match *self {
            Self::CenterCrop(size) => {
                image.resize_to_fill(size.width, size.height, FilterType::Triangle)
            }
            Self::Grayscale => image.grayscale(),
            Self::Blur(sigma) => image.blur(sigma),
            Self::Rotate90 => image.rotate90(),
        }
    }

    fn signature(&self) -> String {
        match self {
            Self::CenterCrop(size) => format!("crop({size})"),
            Self::Grayscale => "gray".to_string(),
            Self::Blur(sigma) => format!("blur({sigma})"),
            Self::Rotate90 => "rot90".to_string(),
        }
    }
}

/// Options controlling how bytes are fetched and kept on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOptions {
    /// Keep fetched bytes in the disk cache after the request completes.
    pub enable_disk_cache: bool,
    /// Age after which a disk entry is treated as a miss. `None` never expires.
    pub disk_cache_validity: Option<Duration>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            enable_disk_cache: true,
            disk_cache_validity: None,
        }
    }
}

impl DownloadOptions {
    /// Enables or disables the disk cache.
    #[must_use]
    pub const fn enable_disk_cache(mut self, enable: bool) -> Self {
        self.enable_disk_cache = enable;
        self
    }

    /// Sets the disk cache validity period.
    #[must_use]
    pub const fn disk_cache_validity(mut self, validity: Duration) -> Self {
        self.disk_cache_validity = Some(validity);
        self
    }
}

/// Options controlling how bytes are decoded into an image.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Fetch options for network sources.
    pub download: DownloadOptions,
    /// Downsample during decode so the image fits within this size.
    pub max_size: Option<ImageSize>,
    /// Resize to exactly this size after decode.
    pub resize: Option<ImageSize>,
    /// Processing steps applied in order after resizing.
    pub processors: Vec<ImageProcessor>,
    /// Store and look up decoded images in the memory cache.
    pub enable_memory_cache: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            download: DownloadOptions::default(),
            max_size: None,
            resize: None,
            processors: Vec::new(),
            enable_memory_cache: true,
        }
    }
}

impl LoadOptions {
    /// Sets the fetch options.
    #[must_use]
    pub fn download(mut self, download: DownloadOptions) -> Self {
        self.download = download;
        self
    }

    /// Sets the maximum decoded size.
    #[must_use]
    pub const fn max_size(mut self, width: u32, height: u32) -> Self {
        self.max_size = Some(ImageSize::new(width, height));
        self
    }

    /// Sets the exact output size.
    #[must_use]
    pub const fn resize(mut self, width: u32, height: u32) -> Self {
        self.resize = Some(ImageSize::new(width, height));
        self
    }

    /// Appends a processing step.
    #[must_use]
    pub fn processor(mut self, processor: ImageProcessor) -> Self {
        self.processors.push(processor);
        self
    }

    /// Enables or disables the memory cache.
    #[must_use]
    pub const fn enable_memory_cache(mut self, enable: bool) -> Self {
        self.enable_memory_cache = enable;
        self
    }

    /// Memory cache signature for a resource decoded with these options.
    ///
    /// Fetch options are not part of the signature since they do not change
    /// the decoded pixels.
    #[must_use]
    pub fn signature(&self, uri: &ResourceUri) -> String {
        let mut key = uri.as_str().to_string();
        if let Some(size) = self.max_size {
            let _ = write!(key, "|max={size}");
        }
        if let Some(size) = self.resize {
            let _ = write!(key, "|resize={size}");
        }
        for processor in &self.processors {
            let _ = write!(key, "|{}", processor.signature());
        }
        key
    }

    /// Applies size limits and processors to a freshly decoded image.
    #[must_use]
    pub fn process(&self, mut image: DynamicImage) -> DynamicImage {
        if let Some(max) = self.max_size
            && (image.width() > max.width || image.height() > max.height)
        {
            image = image.thumbnail(max.width, max.height);
        }
        if let Some(size) = self.resize {
            image = image.resize_exact(size.width, size.height, FilterType::Triangle);
        }
        for processor in &self.processors {
            image = processor.apply(image);
        }
        image
    }
}

/// Options for a request bound to a consumption target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayOptions {
    /// Decode options.
    pub load: LoadOptions,
}

impl DisplayOptions {
    /// Wraps load options.
    #[must_use]
    pub const fn new(load: LoadOptions) -> Self {
        Self { load }
    }
}

impl From<LoadOptions> for DisplayOptions {
    fn from(load: LoadOptions) -> Self {
        Self::new(load)
    }
}
