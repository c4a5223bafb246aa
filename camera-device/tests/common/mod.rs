#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use camera_device::{
    CameraCharacteristics, CameraDevice, CameraMetadata, CaptureCallback, CaptureFailure,
    CaptureListener, CaptureRequest, CaptureResult, CaptureResultExtras, CaptureService,
    DeviceCallbacks, DirectExecutor, Executor, FailureReason, MetadataValue, RemoteError, RemoteResult,
    RequestTemplate, StateCallback, StateError, SubmitInfo, SubmitOutcome, Surface, Task,
    TotalCaptureResult,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Queues tasks until the test runs them
#[derive(Default)]
pub struct ManualExecutor {
    tasks: Mutex<Vec<Task>>,
}

impl ManualExecutor {
    /// Runs everything queued so far, returning how many tasks ran
    pub fn run_all(&self) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }
}

impl Executor for ManualExecutor {
    fn execute(&self, task: Task) {
        self.tasks.lock().unwrap().push(task);
    }
}

/// Blocks inside the first `execute()` until the test releases it, then runs
/// every task inline
pub struct GateExecutor {
    entered: Mutex<Option<Sender<()>>>,
    release: Mutex<Option<Receiver<()>>>,
}

impl GateExecutor {
    /// Returns the executor, a receiver signalled once the first task is
    /// being held, and the sender that lets it through
    pub fn new() -> (Arc<Self>, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gate = Arc::new(Self {
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(Some(release_rx)),
        });
        (gate, entered_rx, release_tx)
    }
}

impl Executor for GateExecutor {
    fn execute(&self, task: Task) {
        let entered = self.entered.lock().unwrap().take();
        if let Some(entered) = entered {
            let release = self.release.lock().unwrap().take().unwrap();
            entered.send(()).unwrap();
            release.recv().unwrap();
        }
        task();
    }
}

/// Calls made on [`FakeCameraService`], in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Submit { requests: usize, repeating: bool },
    Cancel(i32),
    Flush,
    Disconnect,
    BeginConfigure,
    EndConfigure,
    CreateStream(String),
    DeleteStream(i32),
    WaitUntilIdle,
    CreateDefaultRequest(RequestTemplate),
}

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    submits: VecDeque<RemoteResult<SubmitInfo>>,
    cancel: Option<RemoteResult<SubmitOutcome>>,
    flush: Option<RemoteResult<SubmitOutcome>>,
    end_configure: Option<RemoteError>,
    wait_until_idle: Option<RemoteError>,
    disconnect: Option<RemoteError>,
    next_stream_id: i32,
}

/// A camera service whose replies are scripted by the test
#[derive(Default)]
pub struct FakeCameraService {
    script: Mutex<Script>,
}

impl FakeCameraService {
    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn expect_submit(&self, request_id: i32, outcome: SubmitOutcome) {
        self.script()
            .submits
            .push_back(Ok(SubmitInfo { request_id, outcome }));
    }

    pub fn fail_submit(&self, err: RemoteError) {
        self.script().submits.push_back(Err(err));
    }

    pub fn set_cancel(&self, result: RemoteResult<SubmitOutcome>) {
        self.script().cancel = Some(result);
    }

    pub fn set_flush(&self, result: RemoteResult<SubmitOutcome>) {
        self.script().flush = Some(result);
    }

    pub fn reject_configuration(&self) {
        self.script().end_configure =
            Some(RemoteError::IllegalArgument("unsupported stream combination".into()));
    }

    pub fn fail_wait_until_idle(&self, err: RemoteError) {
        self.script().wait_until_idle = Some(err);
    }

    pub fn fail_disconnect(&self, err: RemoteError) {
        self.script().disconnect = Some(err);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.script().calls)
    }

    fn record(&self, call: Call) {
        self.script().calls.push(call);
    }
}

impl CaptureService for FakeCameraService {
    fn submit_request_list(
        &self,
        requests: &[CaptureRequest],
        repeating: bool,
    ) -> RemoteResult<SubmitInfo> {
        let mut script = self.script();
        script.calls.push(Call::Submit {
            requests: requests.len(),
            repeating,
        });
        script
            .submits
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::Transport("unscripted submit".into())))
    }

    fn cancel_request(&self, request_id: i32) -> RemoteResult<SubmitOutcome> {
        let mut script = self.script();
        script.calls.push(Call::Cancel(request_id));
        script
            .cancel
            .take()
            .unwrap_or(Ok(SubmitOutcome::NeverReachedDevice))
    }

    fn flush(&self) -> RemoteResult<SubmitOutcome> {
        let mut script = self.script();
        script.calls.push(Call::Flush);
        script
            .flush
            .take()
            .unwrap_or(Ok(SubmitOutcome::NeverReachedDevice))
    }

    fn disconnect(&self) -> RemoteResult<()> {
        let mut script = self.script();
        script.calls.push(Call::Disconnect);
        script.disconnect.take().map_or(Ok(()), Err)
    }

    fn begin_configure(&self) -> RemoteResult<()> {
        self.record(Call::BeginConfigure);
        Ok(())
    }

    fn end_configure(&self) -> RemoteResult<()> {
        let mut script = self.script();
        script.calls.push(Call::EndConfigure);
        script.end_configure.take().map_or(Ok(()), Err)
    }

    fn create_stream(&self, surface: &Surface) -> RemoteResult<i32> {
        let mut script = self.script();
        script.calls.push(Call::CreateStream(surface.name().to_owned()));
        let stream_id = script.next_stream_id;
        script.next_stream_id += 1;
        Ok(stream_id)
    }

    fn delete_stream(&self, stream_id: i32) -> RemoteResult<()> {
        self.record(Call::DeleteStream(stream_id));
        Ok(())
    }

    fn wait_until_idle(&self) -> RemoteResult<()> {
        let mut script = self.script();
        script.calls.push(Call::WaitUntilIdle);
        script.wait_until_idle.take().map_or(Ok(()), Err)
    }

    fn create_default_request(&self, template: RequestTemplate) -> RemoteResult<CameraMetadata> {
        self.record(Call::CreateDefaultRequest(template));
        let mut settings = CameraMetadata::new();
        settings.set("control.capture_intent", MetadataValue::Int(i32::from(template).into()));
        Ok(settings)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    Started {
        frame_number: i64,
        timestamp: i64,
    },
    Progressed {
        frame_number: i64,
    },
    Completed {
        frame_number: i64,
        partials: usize,
    },
    Failed {
        frame_number: i64,
        reason: FailureReason,
        image_captured: bool,
    },
    SequenceCompleted {
        sequence_id: i32,
        last_frame_number: i64,
    },
    SequenceAborted {
        sequence_id: i32,
    },
}

#[derive(Default)]
pub struct RecordingCaptureCallback {
    events: Mutex<Vec<CaptureEvent>>,
}

impl RecordingCaptureCallback {
    pub fn events(&self) -> Vec<CaptureEvent> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: CaptureEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl CaptureCallback for RecordingCaptureCallback {
    fn on_capture_started(&self, _request: &CaptureRequest, timestamp: i64, frame_number: i64) {
        self.push(CaptureEvent::Started {
            frame_number,
            timestamp,
        });
    }

    fn on_capture_progressed(&self, _request: &CaptureRequest, partial_result: &CaptureResult) {
        self.push(CaptureEvent::Progressed {
            frame_number: partial_result.frame_number(),
        });
    }

    fn on_capture_completed(&self, _request: &CaptureRequest, result: &TotalCaptureResult) {
        self.push(CaptureEvent::Completed {
            frame_number: result.frame_number(),
            partials: result.partial_results().len(),
        });
    }

    fn on_capture_failed(&self, _request: &CaptureRequest, failure: &CaptureFailure) {
        self.push(CaptureEvent::Failed {
            frame_number: failure.frame_number,
            reason: failure.reason,
            image_captured: failure.image_captured,
        });
    }

    fn on_capture_sequence_completed(&self, sequence_id: i32, last_frame_number: i64) {
        self.push(CaptureEvent::SequenceCompleted {
            sequence_id,
            last_frame_number,
        });
    }

    fn on_capture_sequence_aborted(&self, sequence_id: i32) {
        self.push(CaptureEvent::SequenceAborted { sequence_id });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    Opened,
    Unconfigured,
    Active,
    Busy,
    Idle,
    Closed,
    Disconnected,
    Error(StateError),
}

#[derive(Default)]
pub struct RecordingStateCallback {
    events: Mutex<Vec<StateEvent>>,
}

impl RecordingStateCallback {
    pub fn events(&self) -> Vec<StateEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<StateEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    fn push(&self, event: StateEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl StateCallback for RecordingStateCallback {
    fn on_opened(&self) {
        self.push(StateEvent::Opened);
    }
    fn on_unconfigured(&self) {
        self.push(StateEvent::Unconfigured);
    }
    fn on_active(&self) {
        self.push(StateEvent::Active);
    }
    fn on_busy(&self) {
        self.push(StateEvent::Busy);
    }
    fn on_idle(&self) {
        self.push(StateEvent::Idle);
    }
    fn on_closed(&self) {
        self.push(StateEvent::Closed);
    }
    fn on_disconnected(&self) {
        self.push(StateEvent::Disconnected);
    }
    fn on_error(&self, error: StateError) {
        self.push(StateEvent::Error(error));
    }
}

/// An open, configured device wired to a [`FakeCameraService`], with every
/// callback running inline on the calling thread
pub struct Harness {
    pub device: CameraDevice,
    pub service: Arc<FakeCameraService>,
    pub state: Arc<RecordingStateCallback>,
    pub remote: DeviceCallbacks,
    pub output: Surface,
}

impl Harness {
    pub fn open(partial_result_count: u32) -> Self {
        let harness = Self::open_unconfigured(partial_result_count);
        assert_eq!(
            harness
                .device
                .configure_outputs(vec![harness.output.clone()]),
            Ok(true)
        );
        harness.service.take_calls();
        harness.state.take();
        harness
    }

    pub fn open_unconfigured(partial_result_count: u32) -> Self {
        init_logger();

        let state = Arc::new(RecordingStateCallback::default());
        let service = Arc::new(FakeCameraService::default());
        let characteristics =
            CameraCharacteristics::new().with_partial_result_count(partial_result_count);
        let device = CameraDevice::new(
            "0",
            characteristics,
            state.clone(),
            Arc::new(DirectExecutor),
        )
        .unwrap();
        device.set_remote_device(service.clone());
        let remote = device.callbacks();

        Self {
            device,
            service,
            state,
            remote,
            output: Surface::new("preview"),
        }
    }

    pub fn request(&self) -> CaptureRequest {
        CaptureRequest::builder().add_target(&self.output).build()
    }
}

pub fn listener(callback: &Arc<RecordingCaptureCallback>) -> CaptureListener {
    CaptureListener::new(callback.clone(), Arc::new(DirectExecutor))
}

pub fn extras(request_id: i32, frame_number: i64, partial_result_count: u32) -> CaptureResultExtras {
    CaptureResultExtras {
        request_id,
        subsequence_id: 0,
        frame_number,
        partial_result_count,
    }
}
