use std::fmt;
use std::sync::Arc;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::executor::Executor;
use crate::request::CaptureRequest;
use crate::result::{CaptureFailure, CaptureResult, TotalCaptureResult};

/// Errors reported through [`StateCallback::on_error`]
///
/// See [the StateCallback docs](https://developer.android.com/reference/android/hardware/camera2/CameraDevice.StateCallback#ERROR_CAMERA_IN_USE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum StateError {
    CameraInUse = 1,
    MaxCamerasInUse = 2,
    CameraDisabled = 3,
    CameraDevice = 4,
    CameraService = 5,
}

/// Progress notifications for submitted capture requests.
///
/// All methods have empty default implementations.
#[allow(unused_variables)]
pub trait CaptureCallback: Send + Sync {
    /// The device started exposing the frame for `request`
    fn on_capture_started(&self, request: &CaptureRequest, timestamp: i64, frame_number: i64) {}

    /// Some, but not all, of the result metadata for a frame is available
    fn on_capture_progressed(&self, request: &CaptureRequest, partial_result: &CaptureResult) {}

    fn on_capture_completed(&self, request: &CaptureRequest, result: &TotalCaptureResult) {}

    /// Called instead of [`CaptureCallback::on_capture_completed`] when the
    /// device failed to produce a result for the frame
    fn on_capture_failed(&self, request: &CaptureRequest, failure: &CaptureFailure) {}

    /// Every result or failure for the sequence has been delivered
    fn on_capture_sequence_completed(&self, sequence_id: i32, last_frame_number: i64) {}

    /// The sequence was stopped before any of its requests reached the device
    fn on_capture_sequence_aborted(&self, sequence_id: i32) {}
}

/// Lifecycle notifications for a camera device.
///
/// All methods have empty default implementations.
#[allow(unused_variables)]
pub trait StateCallback: Send + Sync {
    fn on_opened(&self) {}

    /// No outputs are configured
    fn on_unconfigured(&self) {}

    /// The device started processing capture requests
    fn on_active(&self) {}

    /// The device is flushing or reconfiguring
    fn on_busy(&self) {}

    /// Every submitted request has been processed
    fn on_idle(&self) {}

    fn on_closed(&self) {}

    fn on_disconnected(&self) {}

    fn on_error(&self, error: StateError) {}
}

/// A [`CaptureCallback`] paired with the [`Executor`] its notifications are
/// delivered on.
#[derive(Clone)]
pub struct CaptureListener {
    callback: Arc<dyn CaptureCallback>,
    executor: Arc<dyn Executor>,
}

impl fmt::Debug for CaptureListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureListener")
            .field("callback", &Arc::as_ptr(&self.callback))
            .finish_non_exhaustive()
    }
}

impl CaptureListener {
    pub fn new(callback: Arc<dyn CaptureCallback>, executor: Arc<dyn Executor>) -> Self {
        Self { callback, executor }
    }

    pub fn callback(&self) -> &Arc<dyn CaptureCallback> {
        &self.callback
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }
}
