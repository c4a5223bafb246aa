//! The boundary with the remote camera service.
//!
//! [`CaptureService`] is the outbound RPC surface the device calls into and
//! [`RemoteDeviceCallbacks`] is the inbound surface the service calls back on,
//! from a thread the device doesn't control.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::RemoteResult;
use crate::request::{CameraMetadata, CaptureRequest, RequestTemplate, Surface};
use crate::result::CaptureResultExtras;

/// Raw wire value meaning no frames were captured for a request
pub const NO_FRAMES_CAPTURED: i64 = -1;

/// Where a sequence ends, as reported by the service when a sequence is
/// submitted, cancelled or flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The sequence's final frame number
    Tracked(i64),
    /// The request never reached the device so no frames will be produced
    NeverReachedDevice,
}

impl SubmitOutcome {
    /// Converts a raw last-frame-number as sent over the wire
    pub fn from_raw(last_frame_number: i64) -> Self {
        if last_frame_number == NO_FRAMES_CAPTURED {
            SubmitOutcome::NeverReachedDevice
        } else {
            SubmitOutcome::Tracked(last_frame_number)
        }
    }

    pub fn last_frame_number(&self) -> Option<i64> {
        match self {
            SubmitOutcome::Tracked(frame) => Some(*frame),
            SubmitOutcome::NeverReachedDevice => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitInfo {
    pub request_id: i32,
    pub outcome: SubmitOutcome,
}

pub trait CaptureService: Send + Sync {
    /// Queue a list of requests. For a repeating submission the returned
    /// outcome describes the end of the repeating sequence it replaced.
    fn submit_request_list(
        &self,
        requests: &[CaptureRequest],
        repeating: bool,
    ) -> RemoteResult<SubmitInfo>;

    fn cancel_request(&self, request_id: i32) -> RemoteResult<SubmitOutcome>;

    fn flush(&self) -> RemoteResult<SubmitOutcome>;

    fn disconnect(&self) -> RemoteResult<()>;

    fn begin_configure(&self) -> RemoteResult<()>;

    /// Rejecting the new stream configuration is reported as
    /// [`RemoteError::IllegalArgument`](crate::RemoteError::IllegalArgument)
    fn end_configure(&self) -> RemoteResult<()>;

    /// Returns the new stream's id
    fn create_stream(&self, surface: &Surface) -> RemoteResult<i32>;

    fn delete_stream(&self, stream_id: i32) -> RemoteResult<()>;

    /// Blocks until every in-flight request has been processed
    fn wait_until_idle(&self) -> RemoteResult<()>;

    fn create_default_request(&self, template: RequestTemplate) -> RemoteResult<CameraMetadata>;
}

/// Error codes sent with [`RemoteDeviceCallbacks::on_device_error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum DeviceErrorCode {
    /// The camera has been disconnected
    Disconnected = 0,
    /// Device-level error
    Device = 1,
    /// Service-level error
    Service = 2,
    /// Error processing a single request
    Request = 3,
    /// Error producing metadata for a single capture
    Result = 4,
    /// Error producing an image buffer for a single capture
    Buffer = 5,
}

/// Notifications the camera service sends about a device.
///
/// For any single frame the service sends zero or more
/// `on_capture_started`, zero or more partial `on_result_received` and then
/// exactly one of a total `on_result_received` or a per-capture
/// `on_device_error`.
pub trait RemoteDeviceCallbacks: Send + Sync {
    fn on_device_idle(&self);

    /// `error_code` is a raw [`DeviceErrorCode`]
    fn on_device_error(&self, error_code: i32, extras: CaptureResultExtras);

    fn on_capture_started(&self, extras: CaptureResultExtras, timestamp: i64);

    fn on_result_received(&self, result: CameraMetadata, extras: CaptureResultExtras);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_last_frame_numbers() {
        assert_eq!(
            SubmitOutcome::from_raw(NO_FRAMES_CAPTURED),
            SubmitOutcome::NeverReachedDevice
        );
        assert_eq!(SubmitOutcome::from_raw(0), SubmitOutcome::Tracked(0));
        assert_eq!(SubmitOutcome::from_raw(42).last_frame_number(), Some(42));
    }
}
