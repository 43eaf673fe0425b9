//! Pipeline error types.

use thiserror::Error;

/// Result type for pipeline operations.
pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Errors reported through a request's failure callback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The identifier matches no known source scheme.
    #[error("unknown scheme: {uri}")]
    UnknownScheme {
        /// The rejected identifier.
        uri: String,
    },

    /// The transport reported a failure.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Bytes were obtained but could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Local I/O failed while reading a source or writing a cache slot.
    #[error("io error: {0}")]
    Io(String),

    /// The request was canceled. Never delivered to a listener.
    #[error("request canceled")]
    Canceled,
}

impl LoadError {
    /// Creates an unknown scheme error.
    #[must_use]
    pub fn unknown_scheme(uri: impl Into<String>) -> Self {
        Self::UnknownScheme { uri: uri.into() }
    }

    /// Creates a fetch error.
    #[must_use]
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch(message.into())
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Creates an I/O error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Returns true if the failure came from the transport.
    #[must_use]
    pub const fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<image::ImageError> for LoadError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            LoadError::unknown_scheme("ftp://x").to_string(),
            "unknown scheme: ftp://x"
        );
        assert_eq!(LoadError::fetch("HTTP 404").to_string(), "fetch failed: HTTP 404");
        assert!(LoadError::fetch("x").is_fetch());
        assert!(!LoadError::decode("x").is_fetch());
    }

    #[test]
    fn test_from_io_error() {
        let err: LoadError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, LoadError::Io(msg) if msg.contains("gone")));
    }
}
