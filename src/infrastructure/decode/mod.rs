//! Source reading and decoder dispatch.

pub mod dispatch;

pub use dispatch::{DecodeSource, DecoderDispatch, ImageCrateDecoder};

#[cfg(test)]
pub(crate) use dispatch::test_support;
