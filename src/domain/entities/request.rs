//! Request identity, lifecycle status and progress values.

use std::fmt;

use uuid::Uuid;

/// Unique identifier of a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

/// Kind of request, ordered by containment: Display wraps Load wraps Download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Fetch bytes into the disk cache.
    Download,
    /// Fetch and decode into an image.
    Load,
    /// Load and deliver into a consumption target.
    Display,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => write!(f, "DOWNLOAD"),
            Self::Load => write!(f, "LOAD"),
            Self::Display => write!(f, "DISPLAY"),
        }
    }
}

/// Lifecycle state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestStatus {
    /// Built, not yet submitted.
    #[default]
    Created,
    /// Classified and enqueued.
    Dispatched,
    /// Resolving the byte source.
    Resolving,
    /// Waiting on a network fetch.
    Downloading,
    /// Decoding bytes into an image.
    Decoding,
    /// Delivered successfully.
    Completed,
    /// Delivered a failure.
    Failed,
    /// Canceled; no callback follows.
    Canceled,
}

impl RequestStatus {
    /// Returns true for Completed, Failed and Canceled.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

/// Transfer progress reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bytes received so far.
    pub completed: u64,
    /// Expected total, if the transport knows it.
    pub total: Option<u64>,
}

impl Progress {
    /// Creates a progress value.
    #[must_use]
    pub const fn new(completed: u64, total: Option<u64>) -> Self {
        Self { completed, total }
    }
}
