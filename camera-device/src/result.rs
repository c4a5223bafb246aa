use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::request::{CameraMetadata, CaptureRequest, MetadataValue};

/// Bookkeeping the camera service attaches to every per-frame notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureResultExtras {
    pub request_id: i32,
    /// Index of the request within its submitted burst
    pub subsequence_id: i32,
    pub frame_number: i64,
    /// How many result messages for this frame have been sent so far,
    /// including this one
    pub partial_result_count: u32,
}

/// Result metadata for a single frame: either a partial piece or the full set
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    metadata: CameraMetadata,
    request: CaptureRequest,
    extras: CaptureResultExtras,
}

impl CaptureResult {
    pub(crate) fn new(
        metadata: CameraMetadata,
        request: CaptureRequest,
        extras: CaptureResultExtras,
    ) -> Self {
        Self {
            metadata,
            request,
            extras,
        }
    }

    pub fn metadata(&self) -> &CameraMetadata {
        &self.metadata
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    pub fn request(&self) -> &CaptureRequest {
        &self.request
    }

    pub fn frame_number(&self) -> i64 {
        self.extras.frame_number
    }

    pub fn sequence_id(&self) -> i32 {
        self.extras.request_id
    }

    pub fn extras(&self) -> &CaptureResultExtras {
        &self.extras
    }
}

/// The complete result for a frame along with every partial result that
/// preceded it, in the order they were received.
#[derive(Debug, Clone, PartialEq)]
pub struct TotalCaptureResult {
    result: CaptureResult,
    partials: Vec<CaptureResult>,
}

impl TotalCaptureResult {
    pub(crate) fn new(result: CaptureResult, partials: Vec<CaptureResult>) -> Self {
        Self { result, partials }
    }

    pub fn result(&self) -> &CaptureResult {
        &self.result
    }

    pub fn partial_results(&self) -> &[CaptureResult] {
        &self.partials
    }

    pub fn frame_number(&self) -> i64 {
        self.result.frame_number()
    }
}

impl std::ops::Deref for TotalCaptureResult {
    type Target = CaptureResult;

    fn deref(&self) -> &Self::Target {
        &self.result
    }
}

/// Why a capture produced a [`CaptureFailure`] instead of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum FailureReason {
    /// An error in the framework or camera device
    Error = 0,
    /// The capture was dropped because of a flush or abort
    Flushed = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureFailure {
    pub request: CaptureRequest,
    pub reason: FailureReason,
    /// Only the result metadata was lost; image buffers may still arrive
    pub image_captured: bool,
    pub sequence_id: i32,
    pub frame_number: i64,
}
