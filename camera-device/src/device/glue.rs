//! Handlers for notifications coming back from the camera service, and the
//! [`DeviceCallbacks`] handle the service calls them through.

use std::sync::{Arc, Weak};

use crate::callbacks::StateError;
use crate::executor::Outbox;
use crate::request::CameraMetadata;
use crate::result::{
    CaptureFailure, CaptureResult, CaptureResultExtras, FailureReason, TotalCaptureResult,
};
use crate::service::{DeviceErrorCode, RemoteDeviceCallbacks};

use super::{CameraDeviceImpl, DeviceInner, Lifecycle};

impl CameraDeviceImpl {
    pub(crate) fn on_device_idle(&self) {
        log::debug!("Camera {}: device idle", self.camera_id);
        self.with_lock(|inner, outbox| {
            // Closed
            if inner.remote.is_none() {
                return;
            }
            if !inner.idle {
                self.post_lifecycle(inner, outbox, Lifecycle::Idle);
            }
            inner.idle = true;
            inner.aborting = false;
        })
    }

    pub(crate) fn on_device_error(&self, error_code: i32, extras: CaptureResultExtras) {
        log::debug!(
            "Device error received, code {}, frame number {}, request ID {}, subseq ID {}",
            error_code,
            extras.frame_number,
            extras.request_id,
            extras.subsequence_id
        );

        self.with_lock(|inner, outbox| {
            if inner.remote.is_none() {
                return;
            }

            let code = DeviceErrorCode::try_from(error_code).unwrap_or_else(|_| {
                log::error!("Unknown error from camera device: {}", error_code);
                DeviceErrorCode::Device
            });

            match code {
                DeviceErrorCode::Disconnected => {
                    self.post_lifecycle(inner, outbox, Lifecycle::Disconnected)
                }
                DeviceErrorCode::Device | DeviceErrorCode::Service => {
                    inner.in_error = true;
                    let error = if code == DeviceErrorCode::Service {
                        StateError::CameraService
                    } else {
                        StateError::CameraDevice
                    };
                    self.post_lifecycle(inner, outbox, Lifecycle::Error(error));

                    inner.repeating_request_id = None;
                    let events = inner.sequences.abort_all();
                    self.post_sequence_events(outbox, events);
                }
                DeviceErrorCode::Request | DeviceErrorCode::Result | DeviceErrorCode::Buffer => {
                    self.on_capture_error_locked(inner, outbox, code, extras)
                }
            }
        })
    }

    fn on_capture_error_locked(
        &self,
        inner: &mut DeviceInner,
        outbox: &mut Outbox,
        code: DeviceErrorCode,
        extras: CaptureResultExtras,
    ) {
        let frame_number = extras.frame_number;

        // The frame may still complete; only the buffer was lost
        if code == DeviceErrorCode::Buffer {
            log::error!(
                "Lost output buffer reported for frame {} of request {}",
                frame_number,
                extras.request_id
            );
            return;
        }

        let reason = if inner.aborting {
            FailureReason::Flushed
        } else {
            FailureReason::Error
        };

        if let Some(holder) = inner.sequences.holder(extras.request_id) {
            match holder.request(extras.subsequence_id) {
                Ok(request) => {
                    let failure = CaptureFailure {
                        request: request.clone(),
                        reason,
                        image_captured: code == DeviceErrorCode::Result,
                        sequence_id: extras.request_id,
                        frame_number,
                    };
                    let request = request.clone();
                    self.post_capture(outbox, holder.listener(), move |cb| {
                        cb.on_capture_failed(&request, &failure)
                    });
                }
                Err(err) => log::error!(
                    "Dropping capture failure for request {}: {}",
                    extras.request_id,
                    err
                ),
            }
        }

        log::trace!("got error frame {}", frame_number);
        inner.frames.update_terminal(frame_number, true);
        self.sweep_locked(inner, outbox);
    }

    pub(crate) fn on_capture_started(&self, extras: CaptureResultExtras, timestamp: i64) {
        log::debug!(
            "Capture started for id {} frame {}",
            extras.request_id,
            extras.frame_number
        );

        self.with_lock(|inner, outbox| {
            if inner.remote.is_none() {
                return;
            }
            // No listener registered for this request
            let holder = match inner.sequences.holder(extras.request_id) {
                Some(holder) => holder,
                None => return,
            };
            match holder.request(extras.subsequence_id) {
                Ok(request) => {
                    let request = request.clone();
                    let frame_number = extras.frame_number;
                    self.post_capture(outbox, holder.listener(), move |cb| {
                        cb.on_capture_started(&request, timestamp, frame_number)
                    });
                }
                Err(err) => log::error!(
                    "Dropping capture start for request {}: {}",
                    extras.request_id,
                    err
                ),
            }
        })
    }

    pub(crate) fn on_result_received(&self, metadata: CameraMetadata, extras: CaptureResultExtras) {
        let frame_number = extras.frame_number;
        log::debug!(
            "Received result frame {} for id {}",
            frame_number,
            extras.request_id
        );

        let partial = extras.partial_result_count < self.characteristics.partial_result_count();

        self.with_lock(|inner, outbox| {
            if inner.remote.is_none() {
                return;
            }

            let target = match inner
                .sequences
                .request(extras.request_id, extras.subsequence_id)
            {
                Ok(request) => inner
                    .sequences
                    .holder(extras.request_id)
                    .map(|holder| (holder.listener().clone(), request.clone())),
                Err(err) => {
                    log::trace!("no target for result frame {}: {}", frame_number, err);
                    None
                }
            };

            match target {
                None => inner.frames.update_result(frame_number, None, partial),
                Some((listener, request)) => {
                    let result = CaptureResult::new(metadata, request.clone(), extras);
                    if partial {
                        let progressed = result.clone();
                        self.post_capture(outbox, &listener, move |cb| {
                            cb.on_capture_progressed(&request, &progressed)
                        });
                        inner.frames.update_result(frame_number, Some(result), true);
                    } else {
                        let partials = inner.frames.pop_partial_results(frame_number);
                        let total = TotalCaptureResult::new(result, partials);
                        self.post_capture(outbox, &listener, move |cb| {
                            cb.on_capture_completed(&request, &total)
                        });
                        inner.frames.update_result(frame_number, None, false);
                    }
                }
            }

            if !partial {
                self.sweep_locked(inner, outbox);
            }
        })
    }
}

/// The handle a [`CaptureService`](crate::CaptureService) delivers device
/// notifications through.
///
/// Only holds a weak reference to the device, so notifications that arrive
/// after the last [`CameraDevice`](crate::CameraDevice) was dropped are
/// ignored.
#[derive(Clone)]
pub struct DeviceCallbacks {
    device: Weak<CameraDeviceImpl>,
}

impl std::fmt::Debug for DeviceCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCallbacks")
            .field("attached", &(self.device.strong_count() > 0))
            .finish()
    }
}

impl DeviceCallbacks {
    pub(crate) fn new(device: &Arc<CameraDeviceImpl>) -> Self {
        Self {
            device: Arc::downgrade(device),
        }
    }

    fn try_with_device_ref(&self, closure: impl FnOnce(Arc<CameraDeviceImpl>)) {
        if let Some(device) = self.device.upgrade() {
            closure(device);
        } else {
            log::error!(
                "Ignoring spurious camera service callback after last device reference was dropped!"
            )
        }
    }
}

impl RemoteDeviceCallbacks for DeviceCallbacks {
    fn on_device_idle(&self) {
        self.try_with_device_ref(|device| device.on_device_idle());
    }

    fn on_device_error(&self, error_code: i32, extras: CaptureResultExtras) {
        self.try_with_device_ref(|device| device.on_device_error(error_code, extras));
    }

    fn on_capture_started(&self, extras: CaptureResultExtras, timestamp: i64) {
        self.try_with_device_ref(|device| device.on_capture_started(extras, timestamp));
    }

    fn on_result_received(&self, result: CameraMetadata, extras: CaptureResultExtras) {
        self.try_with_device_ref(|device| device.on_result_received(result, extras));
    }
}
