//! Domain entity definitions.

mod image;
mod options;
mod request;
mod uri;

pub use image::{ImageSource, ImageStatus, LoadedImage, SharedImage, image_bytes};
pub use options::{DisplayOptions, DownloadOptions, ImageProcessor, ImageSize, LoadOptions};
pub use request::{Progress, RequestId, RequestKind, RequestStatus};
pub use uri::{ResourceUri, Scheme};
