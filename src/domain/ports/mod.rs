//! Port definitions for the pipeline's external collaborators.

mod image_cache_port;
mod source_port;
mod transport_port;

pub use image_cache_port::ImageCachePort;
pub use source_port::{
    ContentResolverPort, DirectoryContentResolver, EmbeddedResourcePort, EmbeddedResources,
    ImageDecoderPort, join_within,
};
pub use transport_port::{ProgressSink, TransportPort};
