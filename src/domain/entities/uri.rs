//! Resource identifiers and their source schemes.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::domain::errors::{LoadError, LoadResult};

/// Source scheme of a resource identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// `http://`
    Http,
    /// `https://`
    Https,
    /// `file://` on the local filesystem.
    File,
    /// `asset://` packaged with the application.
    Asset,
    /// `content://` served by a content provider.
    Content,
    /// `embedded://` compiled into the binary.
    Embedded,
}

impl Scheme {
    const ALL: [Self; 6] = [
        Self::Http,
        Self::Https,
        Self::File,
        Self::Asset,
        Self::Content,
        Self::Embedded,
    ];

    /// Returns the URI prefix for this scheme.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Http => "http://",
            Self::Https => "https://",
            Self::File => "file://",
            Self::Asset => "asset://",
            Self::Content => "content://",
            Self::Embedded => "embedded://",
        }
    }

    /// Returns true if resources of this scheme come from the network.
    #[must_use]
    pub const fn is_network(self) -> bool {
        matches!(self, Self::Http | Self::Https)
    }

    /// Builds a URI of this scheme around a bare path or name.
    #[must_use]
    pub fn create_uri(self, path: &str) -> String {
        format!("{}{path}", self.prefix())
    }

    fn detect(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scheme| {
            let prefix = scheme.prefix();
            uri.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        })
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches("://"))
    }
}

/// A parsed resource identifier. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceUri {
    raw: String,
    scheme: Scheme,
}

impl ResourceUri {
    /// Parses a URI string, classifying its scheme.
    ///
    /// # Errors
    /// Returns [`LoadError::UnknownScheme`] if the string matches no known scheme.
    pub fn parse(uri: impl Into<String>) -> LoadResult<Self> {
        let raw = uri.into();
        match Scheme::detect(&raw) {
            Some(scheme) => Ok(Self { raw, scheme }),
            None => Err(LoadError::unknown_scheme(raw)),
        }
    }

    /// Returns the scheme.
    #[must_use]
    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns the full URI string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the URI with its scheme prefix cropped off.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.raw[self.scheme.prefix().len()..]
    }

    /// Returns true if this resource is fetched from the network.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        self.scheme.is_network()
    }

    /// Content-addressed key used to name the disk cache slot.
    #[must_use]
    pub fn slot_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.raw.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<&str> for ResourceUri {
    type Error = LoadError;

    fn try_from(s: &str) -> LoadResult<Self> {
        Self::parse(s)
    }
}
