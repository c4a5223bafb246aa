use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::callbacks::{CaptureCallback, CaptureListener, StateCallback, StateError};
use crate::config::{CameraCharacteristics, CharacteristicsRef};
use crate::error::{AccessReason, CameraError, RemoteError, RemoteResult, Result};
use crate::executor::{DispatchQueue, Executor, Outbox};
use crate::frame_tracker::FrameNumberTracker;
use crate::request::{CaptureRequest, CaptureRequestBuilder, RequestTemplate, Surface};
use crate::sequence::{CaptureCallbackHolder, SequenceEvent, SequenceTracker};
use crate::service::CaptureService;
use crate::util;

pub(crate) mod glue;

pub use glue::DeviceCallbacks;

/// The lifecycle state of a camera device, as last reported through its
/// [`StateCallback`]
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum DeviceState {
    /// No outputs are configured
    Unconfigured,
    /// Outputs are configured and no requests are in flight
    Idle,
    /// Requests are in flight
    Active,
    /// Transient state while flushing or reconfiguring outputs
    Busy,
    /// A fatal error was reported; the device can only be closed
    Error,
    Closed,
}

/// Lifecycle notifications that are posted to the device's [`StateCallback`]
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum Lifecycle {
    Opened,
    Unconfigured,
    Active,
    Busy,
    Idle,
    Disconnected,
    Error(StateError),
}

impl Lifecycle {
    fn state(self) -> Option<DeviceState> {
        match self {
            Lifecycle::Unconfigured => Some(DeviceState::Unconfigured),
            Lifecycle::Active => Some(DeviceState::Active),
            Lifecycle::Busy => Some(DeviceState::Busy),
            Lifecycle::Idle => Some(DeviceState::Idle),
            Lifecycle::Error(_) => Some(DeviceState::Error),
            Lifecycle::Opened | Lifecycle::Disconnected => None,
        }
    }
}

pub(crate) struct DeviceInner {
    pub remote: Option<Arc<dyn CaptureService>>,
    pub state: DeviceState,
    pub in_error: bool,
    pub idle: bool,
    /// Set by `abort_captures()` until the device next reports idle
    pub aborting: bool,
    pub repeating_request_id: Option<i32>,
    /// stream id -> output
    pub configured_outputs: BTreeMap<i32, Surface>,
    pub sequences: SequenceTracker,
    pub frames: FrameNumberTracker,
    /// Callbacks queued by every lock section, in lock order
    pub dispatch: DispatchQueue,
}

pub(crate) struct CameraDeviceImpl {
    camera_id: String,
    characteristics: CharacteristicsRef,
    state_callback: Arc<dyn StateCallback>,
    device_executor: Arc<dyn Executor>,

    /// Set once `close()` runs; dispatched callbacks check this before
    /// calling into application code
    closed: Arc<AtomicBool>,
    closed_notified: Arc<AtomicBool>,

    inner: Mutex<DeviceInner>,
}

impl CameraDeviceImpl {
    pub fn new(
        camera_id: String,
        characteristics: CameraCharacteristics,
        state_callback: Arc<dyn StateCallback>,
        device_executor: Arc<dyn Executor>,
    ) -> Result<Self> {
        if camera_id.is_empty() {
            return Err(CameraError::InvalidArgument("Empty camera id".into()));
        }

        let characteristics = CharacteristicsRef::new(characteristics);
        log::trace!("Camera {}: {:?}", camera_id, characteristics);

        Ok(Self {
            camera_id,
            characteristics,
            state_callback,
            device_executor,
            closed: Arc::new(AtomicBool::new(false)),
            closed_notified: Arc::new(AtomicBool::new(false)),
            inner: Mutex::new(DeviceInner {
                remote: None,
                state: DeviceState::Unconfigured,
                in_error: false,
                idle: true,
                aborting: false,
                repeating_request_id: None,
                configured_outputs: BTreeMap::new(),
                sequences: SequenceTracker::new(),
                frames: FrameNumberTracker::new(),
                dispatch: DispatchQueue::default(),
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.camera_id
    }

    pub fn characteristics(&self) -> CharacteristicsRef {
        self.characteristics.clone()
    }

    pub fn state(&self) -> DeviceState {
        self.lock().state
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, DeviceInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` under the interface lock.
    ///
    /// Whatever `f` queued in the outbox joins the device's dispatch queue
    /// before the lock is released, and is posted once the lock is released,
    /// either by this thread or by one that is already draining the queue.
    pub(crate) fn with_lock<R>(&self, f: impl FnOnce(&mut DeviceInner, &mut Outbox) -> R) -> R {
        let mut outbox = Outbox::default();
        let (ret, drain) = {
            let mut guard = self.lock();
            let ret = f(&mut *guard, &mut outbox);
            if outbox.len() > 0 {
                log::trace!("Camera {}: queueing {} callbacks", self.camera_id, outbox.len());
            }
            guard.dispatch.push(outbox);
            (ret, guard.dispatch.begin_drain())
        };
        if drain {
            self.drain_dispatches();
        }
        ret
    }

    /// Hands queued callbacks to their executors until the queue is empty.
    ///
    /// The lock is only held to pop each task, so callbacks (and executors)
    /// may call back into the device; anything they queue is picked up by
    /// this loop.
    fn drain_dispatches(&self) {
        loop {
            let next = self.lock().dispatch.pop();
            match next {
                Some((executor, task)) => util::run_guarded(|| executor.execute(task)),
                None => return,
            }
        }
    }

    fn check_closed_or_in_error(inner: &DeviceInner) -> Result<Arc<dyn CaptureService>> {
        if inner.in_error {
            return Err(CameraError::DeviceInError);
        }
        inner.remote.clone().ok_or(CameraError::DeviceClosed)
    }

    ////////////////////////////
    // Callback dispatch
    ////////////////////////////

    fn post_lifecycle(&self, inner: &mut DeviceInner, outbox: &mut Outbox, event: Lifecycle) {
        if let Some(state) = event.state() {
            inner.state = state;
        }
        log::debug!("Camera {}: {:?}", self.camera_id, event);

        let callback = self.state_callback.clone();
        let closed = self.closed.clone();
        outbox.post(&self.device_executor, move || {
            if closed.load(Ordering::Acquire) {
                return;
            }
            match event {
                Lifecycle::Opened => callback.on_opened(),
                Lifecycle::Unconfigured => callback.on_unconfigured(),
                Lifecycle::Active => callback.on_active(),
                Lifecycle::Busy => callback.on_busy(),
                Lifecycle::Idle => callback.on_idle(),
                Lifecycle::Disconnected => callback.on_disconnected(),
                Lifecycle::Error(error) => callback.on_error(error),
            }
        });
    }

    fn post_closed(&self, outbox: &mut Outbox) {
        let callback = self.state_callback.clone();
        let notified = self.closed_notified.clone();
        outbox.post(&self.device_executor, move || {
            if notified.swap(true, Ordering::AcqRel) {
                log::error!("Not posting on_closed more than once");
                return;
            }
            callback.on_closed();
        });
    }

    pub(crate) fn post_capture<F>(&self, outbox: &mut Outbox, listener: &CaptureListener, f: F)
    where
        F: FnOnce(&dyn CaptureCallback) + Send + 'static,
    {
        let callback = listener.callback().clone();
        let closed = self.closed.clone();
        outbox.post(listener.executor(), move || {
            if !closed.load(Ordering::Acquire) {
                f(&*callback);
            }
        });
    }

    pub(crate) fn post_sequence_events(&self, outbox: &mut Outbox, events: Vec<SequenceEvent>) {
        for event in events {
            log::debug!("fire sequence event for request {}", event.request_id());
            match event {
                SequenceEvent::Completed {
                    request_id,
                    last_frame_number,
                    listener,
                } => {
                    self.post_capture(outbox, &listener, move |cb| {
                        cb.on_capture_sequence_completed(request_id, last_frame_number)
                    });
                }
                SequenceEvent::Aborted {
                    request_id,
                    listener,
                } => {
                    self.post_capture(outbox, &listener, move |cb| {
                        cb.on_capture_sequence_aborted(request_id)
                    });
                }
            }
        }
    }

    pub(crate) fn sweep_locked(&self, inner: &mut DeviceInner, outbox: &mut Outbox) {
        let events = inner.sequences.sweep(inner.frames.completed_frame_number());
        self.post_sequence_events(outbox, events);
    }

    ////////////////////////////
    // Opening
    ////////////////////////////

    pub fn set_remote_device(&self, remote: Arc<dyn CaptureService>) {
        self.with_lock(|inner, outbox| {
            if self.is_closed() {
                log::warn!(
                    "Camera {}: ignoring remote device for a closed device",
                    self.camera_id
                );
                return;
            }
            // A startup failure was already reported
            if inner.in_error {
                log::warn!(
                    "Camera {}: ignoring remote device after a remote failure",
                    self.camera_id
                );
                return;
            }
            inner.remote = Some(remote);
            self.post_lifecycle(inner, outbox, Lifecycle::Opened);
            self.post_lifecycle(inner, outbox, Lifecycle::Unconfigured);
        })
    }

    pub fn set_remote_failure(&self, reason: AccessReason) {
        let error = match reason {
            AccessReason::InUse => Some(StateError::CameraInUse),
            AccessReason::MaxInUse => Some(StateError::MaxCamerasInUse),
            AccessReason::Disabled => Some(StateError::CameraDisabled),
            AccessReason::Error => Some(StateError::CameraDevice),
            AccessReason::Disconnected => None,
        };
        self.with_lock(|inner, outbox| {
            inner.in_error = true;
            match error {
                Some(error) => self.post_lifecycle(inner, outbox, Lifecycle::Error(error)),
                None => {
                    inner.state = DeviceState::Error;
                    self.post_lifecycle(inner, outbox, Lifecycle::Disconnected);
                }
            }
        })
    }

    ////////////////////////////
    // Requests
    ////////////////////////////

    pub fn create_capture_request(&self, template: RequestTemplate) -> Result<CaptureRequestBuilder> {
        let remote = Self::check_closed_or_in_error(&self.lock())?;
        match remote.create_default_request(template) {
            Ok(settings) => Ok(CaptureRequestBuilder::new(settings)),
            Err(RemoteError::Transport(msg)) => {
                log::error!(
                    "Camera {}: transport failure creating {:?} request: {}",
                    self.camera_id,
                    template,
                    msg
                );
                Err(CameraError::Transport(msg))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn submit_capture_request(
        &self,
        requests: Vec<CaptureRequest>,
        listener: Option<CaptureListener>,
        repeating: bool,
    ) -> Result<i32> {
        if requests.is_empty() {
            return Err(CameraError::InvalidArgument(
                "At least one request must be given".into(),
            ));
        }
        for request in &requests {
            request.validate()?;
        }

        self.with_lock(|inner, outbox| {
            let remote = Self::check_closed_or_in_error(inner)?;

            if repeating {
                self.stop_repeating_locked(inner, outbox)?;
            }

            let info = match remote.submit_request_list(&requests, repeating) {
                Ok(info) => info,
                Err(RemoteError::Transport(msg)) => {
                    log::error!(
                        "Camera {}: transport failure submitting requests: {}",
                        self.camera_id,
                        msg
                    );
                    return Err(CameraError::Transport(msg));
                }
                Err(err) => return Err(err.into()),
            };
            let request_id = info.request_id;
            log::trace!("request {}: last frame number {:?}", request_id, info.outcome);

            match listener {
                Some(listener) => inner.sequences.register(
                    request_id,
                    CaptureCallbackHolder::new(listener, requests, repeating),
                ),
                None => log::debug!("Listener for request {} is null", request_id),
            }

            let completed = inner.frames.completed_frame_number();
            if repeating {
                // The outcome of a repeating submission describes the end of
                // the repeating sequence it replaces
                if let Some(previous) = inner.repeating_request_id.replace(request_id) {
                    let events = inner.sequences.record(previous, info.outcome, completed);
                    self.post_sequence_events(outbox, events);
                }
            } else {
                let events = inner.sequences.record(request_id, info.outcome, completed);
                self.post_sequence_events(outbox, events);
            }

            if inner.idle {
                self.post_lifecycle(inner, outbox, Lifecycle::Active);
            }
            inner.idle = false;

            Ok(request_id)
        })
    }

    pub fn stop_repeating(&self) -> Result<()> {
        self.with_lock(|inner, outbox| self.stop_repeating_locked(inner, outbox))
    }

    fn stop_repeating_locked(&self, inner: &mut DeviceInner, outbox: &mut Outbox) -> Result<()> {
        let remote = Self::check_closed_or_in_error(inner)?;
        let request_id = match inner.repeating_request_id.take() {
            Some(request_id) => request_id,
            None => return Ok(()),
        };

        if let Some(holder) = inner.sequences.holder(request_id) {
            log::trace!(
                "stopping request {} (repeating: {})",
                request_id,
                holder.is_repeating()
            );
        }

        match remote.cancel_request(request_id) {
            Ok(outcome) => {
                let completed = inner.frames.completed_frame_number();
                let events = inner.sequences.record(request_id, outcome, completed);
                self.post_sequence_events(outbox, events);
                Ok(())
            }
            Err(RemoteError::Transport(msg)) => {
                log::error!(
                    "Camera {}: transport failure cancelling request {}: {}",
                    self.camera_id,
                    request_id,
                    msg
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn wait_until_idle_locked(&self, inner: &mut DeviceInner) -> Result<()> {
        let remote = Self::check_closed_or_in_error(inner)?;
        if inner.repeating_request_id.is_some() {
            return Err(CameraError::RepeatingRequestActive);
        }
        match remote.wait_until_idle() {
            Ok(()) => Ok(()),
            Err(RemoteError::Transport(msg)) => {
                log::error!(
                    "Camera {}: transport failure waiting for idle: {}",
                    self.camera_id,
                    msg
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.with_lock(|inner, outbox| self.flush_locked(inner, outbox))
    }

    pub fn abort_captures(&self) -> Result<()> {
        self.with_lock(|inner, outbox| {
            Self::check_closed_or_in_error(inner)?;
            inner.aborting = true;
            self.flush_locked(inner, outbox)
        })
    }

    fn flush_locked(&self, inner: &mut DeviceInner, outbox: &mut Outbox) -> Result<()> {
        let remote = Self::check_closed_or_in_error(inner)?;

        self.post_lifecycle(inner, outbox, Lifecycle::Busy);

        // Nothing in flight; just do a busy->idle transition
        if inner.idle {
            inner.aborting = false;
            self.post_lifecycle(inner, outbox, Lifecycle::Idle);
            return Ok(());
        }

        match remote.flush() {
            Ok(outcome) => {
                if let Some(request_id) = inner.repeating_request_id.take() {
                    let completed = inner.frames.completed_frame_number();
                    let events = inner.sequences.record(request_id, outcome, completed);
                    self.post_sequence_events(outbox, events);
                }
                Ok(())
            }
            Err(RemoteError::Transport(msg)) => {
                log::error!("Camera {}: transport failure flushing: {}", self.camera_id, msg);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    ////////////////////////////
    // Outputs
    ////////////////////////////

    pub fn configure_outputs(&self, outputs: Vec<Surface>) -> Result<bool> {
        if let Some(surface) = outputs.iter().find(|s| !s.is_valid()) {
            return Err(CameraError::InvalidArgument(format!(
                "Released Surface {} '{}' can't be configured",
                surface.id(),
                surface.name()
            )));
        }

        self.with_lock(|inner, outbox| {
            Self::check_closed_or_in_error(inner)?;

            // Streams to delete, and outputs that still need a stream
            let delete: Vec<i32> = inner
                .configured_outputs
                .iter()
                .filter(|(_, surface)| !outputs.contains(surface))
                .map(|(stream_id, _)| *stream_id)
                .collect();
            let mut add: Vec<Surface> = Vec::new();
            for surface in &outputs {
                let configured = inner.configured_outputs.values().any(|s| s == surface);
                if !configured && !add.contains(surface) {
                    add.push(surface.clone());
                }
            }

            self.post_lifecycle(inner, outbox, Lifecycle::Busy);
            self.stop_repeating_locked(inner, outbox)?;

            let result = self.reconfigure_locked(inner, &add, &delete);

            if matches!(result, Ok(true)) && !outputs.is_empty() {
                self.post_lifecycle(inner, outbox, Lifecycle::Idle);
            } else {
                // Always return to the unconfigured state unless configuration
                // succeeded with outputs
                self.post_lifecycle(inner, outbox, Lifecycle::Unconfigured);
            }
            result
        })
    }

    fn reconfigure_locked(
        &self,
        inner: &mut DeviceInner,
        add: &[Surface],
        delete: &[i32],
    ) -> Result<bool> {
        self.wait_until_idle_locked(inner)?;
        let remote = Self::check_closed_or_in_error(inner)?;

        match apply_stream_changes(&*remote, &mut inner.configured_outputs, add, delete) {
            Ok(success) => Ok(success),
            Err(RemoteError::Transport(msg)) => {
                log::error!(
                    "Camera {}: transport failure configuring streams: {}",
                    self.camera_id,
                    msg
                );
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    ////////////////////////////
    // Closing
    ////////////////////////////

    pub fn close(&self) {
        self.with_lock(|inner, outbox| {
            if let Some(remote) = inner.remote.as_ref() {
                if let Err(err) = remote.disconnect() {
                    log::error!("Camera {}: error while closing: {}", self.camera_id, err);
                }
            }

            // Either a normal close with a valid remote device, or a close
            // after a startup error
            if inner.remote.is_some() || inner.in_error {
                self.post_closed(outbox);
            }

            if inner.sequences.pending_len() > 0 {
                log::debug!(
                    "Camera {}: closing with {} sequences still pending",
                    self.camera_id,
                    inner.sequences.pending_len()
                );
            }

            inner.remote = None;
            inner.in_error = false;
            inner.repeating_request_id = None;
            inner.state = DeviceState::Closed;
            self.closed.store(true, Ordering::Release);
        })
    }
}

impl Drop for CameraDeviceImpl {
    fn drop(&mut self) {
        log::debug!("CameraDeviceImpl::drop({})", self.camera_id);
        self.close();
    }
}

fn apply_stream_changes(
    remote: &dyn CaptureService,
    configured: &mut BTreeMap<i32, Surface>,
    add: &[Surface],
    delete: &[i32],
) -> RemoteResult<bool> {
    remote.begin_configure()?;

    // Delete streams first to free up resources
    for &stream_id in delete {
        remote.delete_stream(stream_id)?;
        configured.remove(&stream_id);
    }

    for surface in add {
        let stream_id = remote.create_stream(surface)?;
        configured.insert(stream_id, surface.clone());
    }

    match remote.end_configure() {
        Ok(()) => Ok(true),
        // The service rejects stream configurations the device can't support
        Err(RemoteError::IllegalArgument(msg)) => {
            log::warn!("Stream configuration failed: {}", msg);
            Ok(false)
        }
        Err(err) => Err(err),
    }
}
