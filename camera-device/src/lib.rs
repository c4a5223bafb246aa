//! Client-side capture sequencing for a camera device.
//!
//! A [`CameraDevice`] issues capture requests to an asynchronous
//! [`CaptureService`] and turns the out-of-order stream of per-frame
//! notifications it gets back (through [`DeviceCallbacks`]) into ordered
//! callbacks on each request's [`CaptureCallback`], including exactly one
//! "sequence completed" or "sequence aborted" notification per submission.
//!
//! Callbacks are never run while the device's internal lock is held; they are
//! posted to the [`Executor`] given along with each callback, so they are free
//! to call back into the device. Callbacks are handed to their executors in
//! the order the device produced them, even when notifications and calls
//! arrive on different threads. Callbacks produced by a call made from inside
//! a callback are posted after that callback returns.

use std::hash::Hash;
use std::sync::Arc;

mod callbacks;
pub use callbacks::{CaptureCallback, CaptureListener, StateCallback, StateError};

mod config;
pub use config::{CameraCharacteristics, CharacteristicsRef};

mod device;
use device::CameraDeviceImpl;
pub use device::{DeviceCallbacks, DeviceState};

mod error;
pub use error::{AccessReason, CameraError, RemoteError, RemoteResult, Result};

mod executor;
pub use executor::{DirectExecutor, Executor, Task, ThreadExecutor};

mod frame_tracker;

mod request;
pub use request::{
    CameraMetadata, CaptureRequest, CaptureRequestBuilder, MetadataValue, RequestTemplate,
    Surface,
};

mod result;
pub use result::{
    CaptureFailure, CaptureResult, CaptureResultExtras, FailureReason, TotalCaptureResult,
};

mod sequence;

mod service;
pub use service::{
    CaptureService, DeviceErrorCode, RemoteDeviceCallbacks, SubmitInfo, SubmitOutcome,
    NO_FRAMES_CAPTURED,
};

mod util;

/// A handle to an open camera device.
///
/// Handles are cheap to clone and all refer to the same device. The device is
/// closed when the last handle is dropped, if it wasn't closed explicitly.
#[derive(Clone)]
pub struct CameraDevice {
    pub(crate) inner: Arc<CameraDeviceImpl>,
}

impl PartialEq for CameraDevice {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
impl Eq for CameraDevice {}

impl Hash for CameraDevice {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl std::fmt::Debug for CameraDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraDevice")
            .field("id", &self.inner.id())
            .field("state", &self.inner.state())
            .finish()
    }
}

impl CameraDevice {
    /// Creates the client side of a device that is being opened.
    ///
    /// The device isn't usable until the camera service hands over its
    /// remote end with [`set_remote_device()`](Self::set_remote_device), or
    /// reports that opening failed with
    /// [`set_remote_failure()`](Self::set_remote_failure). Lifecycle
    /// notifications are posted to `callback` on `executor`.
    pub fn new(
        camera_id: impl Into<String>,
        characteristics: CameraCharacteristics,
        callback: Arc<dyn StateCallback>,
        executor: Arc<dyn Executor>,
    ) -> Result<Self> {
        let inner = CameraDeviceImpl::new(camera_id.into(), characteristics, callback, executor)?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn id(&self) -> &str {
        self.inner.id()
    }

    /// Returns a (cheaply clonable) reference to this device's
    /// [`CameraCharacteristics`]
    pub fn characteristics(&self) -> CharacteristicsRef {
        self.inner.characteristics()
    }

    /// The state most recently posted to the device's [`StateCallback`]
    pub fn state(&self) -> DeviceState {
        self.inner.state()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// The handle the camera service should deliver device notifications to
    pub fn callbacks(&self) -> DeviceCallbacks {
        DeviceCallbacks::new(&self.inner)
    }

    /// Attaches the remote end of the device once opening succeeded.
    ///
    /// Posts `on_opened` followed by `on_unconfigured`.
    pub fn set_remote_device(&self, remote: Arc<dyn CaptureService>) {
        self.inner.set_remote_device(remote);
    }

    /// Reports that opening the device failed.
    ///
    /// The device enters the error state and either `on_error` or
    /// `on_disconnected` is posted, depending on `reason`.
    pub fn set_remote_failure(&self, reason: AccessReason) {
        self.inner.set_remote_failure(reason);
    }

    /// Asks the camera service for default settings suited to `template`
    pub fn create_capture_request(&self, template: RequestTemplate) -> Result<CaptureRequestBuilder> {
        self.inner.create_capture_request(template)
    }

    /// Replaces the set of configured outputs.
    ///
    /// Returns `Ok(false)` if the camera service rejected the new
    /// configuration, in which case the device is left unconfigured.
    pub fn configure_outputs(&self, outputs: Vec<Surface>) -> Result<bool> {
        self.inner.configure_outputs(outputs)
    }

    /// Submits a single request, returning its sequence id
    pub fn capture(
        &self,
        request: CaptureRequest,
        listener: Option<CaptureListener>,
    ) -> Result<i32> {
        self.inner
            .submit_capture_request(vec![request], listener, false)
    }

    pub fn capture_burst(
        &self,
        requests: Vec<CaptureRequest>,
        listener: Option<CaptureListener>,
    ) -> Result<i32> {
        self.inner.submit_capture_request(requests, listener, false)
    }

    /// Replaces any current repeating request with `request`
    pub fn set_repeating_request(
        &self,
        request: CaptureRequest,
        listener: Option<CaptureListener>,
    ) -> Result<i32> {
        self.inner
            .submit_capture_request(vec![request], listener, true)
    }

    pub fn set_repeating_burst(
        &self,
        requests: Vec<CaptureRequest>,
        listener: Option<CaptureListener>,
    ) -> Result<i32> {
        self.inner.submit_capture_request(requests, listener, true)
    }

    /// Cancels the current repeating request, if any.
    ///
    /// Its sequence completes once the last frame already in flight has been
    /// delivered.
    pub fn stop_repeating(&self) -> Result<()> {
        self.inner.stop_repeating()
    }

    /// Discards as much in-flight work as possible
    pub fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    /// Like [`flush()`](Self::flush), but captures that fail until the device
    /// next goes idle are reported with [`FailureReason::Flushed`]
    pub fn abort_captures(&self) -> Result<()> {
        self.inner.abort_captures()
    }

    /// Disconnects from the camera service.
    ///
    /// Safe to call more than once; `on_closed` is only posted once. Capture
    /// and lifecycle callbacks that haven't run yet are dropped.
    pub fn close(&self) {
        self.inner.close();
    }
}

#[test]
fn test_device_is_send_sync() {
    fn needs_send_sync<T: Send + Sync>() {}
    needs_send_sync::<CameraDevice>();
    needs_send_sync::<DeviceCallbacks>();
}
