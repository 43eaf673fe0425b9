//! Consumption targets and the request currently bound to each.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::application::requests::RequestHandle;
use crate::domain::entities::{ImageStatus, RequestId, SharedImage};

#[derive(Default)]
struct TargetSlot {
    request: Option<RequestHandle>,
    image: Option<SharedImage>,
    status: ImageStatus,
}

/// A place an image is displayed in, such as a view or a widget cell.
///
/// At most one display request is bound to a target. Binding a new request
/// cancels the previous one, and results are only applied while the request
/// that produced them is still bound. Clones share the same target.
#[derive(Clone, Default)]
pub struct ImageTarget {
    slot: Arc<Mutex<TargetSlot>>,
}

impl ImageTarget {
    /// Creates an unbound, empty target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `request`, canceling the previously bound request.
    pub(crate) fn bind(&self, request: RequestHandle) {
        let previous = {
            let mut slot = self.slot.lock();
            slot.status = ImageStatus::NotStarted;
            slot.request.replace(request)
        };
        if let Some(previous) = previous
            && previous.cancel()
        {
            trace!(request = %previous.id(), "Canceled request on rebind");
        }
    }

    /// Returns true if request `id` is the one currently bound.
    #[must_use]
    pub fn is_bound_to(&self, id: RequestId) -> bool {
        self.slot
            .lock()
            .request
            .as_ref()
            .is_some_and(|request| request.id() == id)
    }

    /// The request currently bound, if any.
    #[must_use]
    pub fn request(&self) -> Option<RequestHandle> {
        self.slot.lock().request.clone()
    }

    /// Cancels and unbinds the current request.
    ///
    /// Returns true if a request was bound and still running.
    pub fn cancel(&self) -> bool {
        let request = self.slot.lock().request.take();
        request.is_some_and(|request| request.cancel())
    }

    /// Current loading status.
    #[must_use]
    pub fn status(&self) -> ImageStatus {
        self.slot.lock().status.clone()
    }

    /// The image currently shown.
    #[must_use]
    pub fn image(&self) -> Option<SharedImage> {
        self.slot.lock().image.clone()
    }

    pub(crate) fn set_status(&self, status: ImageStatus) {
        self.slot.lock().status = status;
    }

    /// Shows `image`, releasing whatever was shown before.
    pub(crate) fn set_image(&self, image: SharedImage) {
        let previous = {
            let mut slot = self.slot.lock();
            slot.status = ImageStatus::Ready;
            slot.image.replace(image)
        };
        drop(previous);
    }

    /// Releases the shown image.
    pub fn clear(&self) {
        let previous = {
            let mut slot = self.slot.lock();
            slot.status = ImageStatus::NotStarted;
            slot.image.take()
        };
        drop(previous);
    }
}

impl std::fmt::Debug for ImageTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("ImageTarget")
            .field("request", &slot.request.as_ref().map(RequestHandle::id))
            .field("has_image", &slot.image.is_some())
            .field("status", &slot.status)
            .finish()
    }
}
