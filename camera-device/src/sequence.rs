use std::collections::HashMap;

use crate::callbacks::CaptureListener;
use crate::error::{CameraError, Result};
use crate::request::CaptureRequest;
use crate::service::SubmitOutcome;

/// A submitted sequence that has a listener waiting on it
#[derive(Debug)]
pub(crate) struct CaptureCallbackHolder {
    listener: CaptureListener,
    requests: Vec<CaptureRequest>,
    repeating: bool,
}

impl CaptureCallbackHolder {
    pub fn new(listener: CaptureListener, requests: Vec<CaptureRequest>, repeating: bool) -> Self {
        Self {
            listener,
            requests,
            repeating,
        }
    }

    pub fn listener(&self) -> &CaptureListener {
        &self.listener
    }

    pub fn is_repeating(&self) -> bool {
        self.repeating
    }

    /// The request at `subsequence_id` within the submitted burst
    pub fn request(&self, subsequence_id: i32) -> Result<&CaptureRequest> {
        if subsequence_id < 0 {
            return Err(CameraError::InvalidArgument(format!(
                "Requested subsequenceId {} is negative",
                subsequence_id
            )));
        }
        self.requests.get(subsequence_id as usize).ok_or_else(|| {
            CameraError::InvalidArgument(format!(
                "Requested subsequenceId {} is larger than request list size {}.",
                subsequence_id,
                self.requests.len()
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameNumberBound {
    pub last_frame_number: i64,
    pub request_id: i32,
}

/// A terminal notification that is ready to be posted to a listener
#[derive(Debug)]
pub(crate) enum SequenceEvent {
    Completed {
        request_id: i32,
        last_frame_number: i64,
        listener: CaptureListener,
    },
    Aborted {
        request_id: i32,
        listener: CaptureListener,
    },
}

impl SequenceEvent {
    pub fn request_id(&self) -> i32 {
        match self {
            SequenceEvent::Completed { request_id, .. } | SequenceEvent::Aborted { request_id, .. } => {
                *request_id
            }
        }
    }
}

/// Per-request bookkeeping: which sequences have listeners and which last
/// frame each sequence is waiting on.
#[derive(Debug, Default)]
pub(crate) struct SequenceTracker {
    holders: HashMap<i32, CaptureCallbackHolder>,
    // Insertion order; not sorted by frame number
    pending: Vec<FrameNumberBound>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, request_id: i32, holder: CaptureCallbackHolder) {
        if self.holders.insert(request_id, holder).is_some() {
            log::warn!("Replacing existing registration for request {}", request_id);
        }
    }

    pub fn holder(&self, request_id: i32) -> Option<&CaptureCallbackHolder> {
        self.holders.get(&request_id)
    }

    pub fn request(&self, request_id: i32, subsequence_id: i32) -> Result<&CaptureRequest> {
        self.holders
            .get(&request_id)
            .ok_or_else(|| {
                CameraError::InvalidArgument(format!("No sequence registered for request {request_id}"))
            })?
            .request(subsequence_id)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Record where the sequence for `request_id` ends.
    ///
    /// A sequence that never reached the device is aborted straight away;
    /// otherwise its bound is queued and checked against `completed_frame_number`
    /// since its last frame may already have arrived.
    pub fn record(
        &mut self,
        request_id: i32,
        outcome: SubmitOutcome,
        completed_frame_number: i64,
    ) -> Vec<SequenceEvent> {
        match outcome {
            SubmitOutcome::NeverReachedDevice => match self.holders.remove(&request_id) {
                Some(holder) => {
                    log::trace!(
                        "remove holder for request {}, because it never reached the device",
                        request_id
                    );
                    vec![SequenceEvent::Aborted {
                        request_id,
                        listener: holder.listener,
                    }]
                }
                None => {
                    log::warn!("did not register callback to request {}", request_id);
                    Vec::new()
                }
            },
            SubmitOutcome::Tracked(last_frame_number) => {
                self.pending.push(FrameNumberBound {
                    last_frame_number,
                    request_id,
                });
                self.sweep(completed_frame_number)
            }
        }
    }

    /// Complete every queued sequence whose last frame is at or below
    /// `completed_frame_number`.
    pub fn sweep(&mut self, completed_frame_number: i64) -> Vec<SequenceEvent> {
        let mut events = Vec::new();
        let holders = &mut self.holders;
        self.pending.retain(|bound| {
            if bound.last_frame_number > completed_frame_number {
                return true;
            }
            if let Some(holder) = holders.remove(&bound.request_id) {
                log::trace!(
                    "remove holder for request {}, because lastFrame {} is <= {}",
                    bound.request_id,
                    bound.last_frame_number,
                    completed_frame_number
                );
                events.push(SequenceEvent::Completed {
                    request_id: bound.request_id,
                    last_frame_number: bound.last_frame_number,
                    listener: holder.listener,
                });
            }
            false
        });
        events
    }

    /// Drop every registration and queued bound, aborting all sequences that
    /// still have listeners
    pub fn abort_all(&mut self) -> Vec<SequenceEvent> {
        self.pending.clear();
        let mut ids: Vec<i32> = self.holders.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|request_id| {
                self.holders
                    .remove(&request_id)
                    .map(|holder| SequenceEvent::Aborted {
                        request_id,
                        listener: holder.listener,
                    })
            })
            .collect()
    }
}
