use std::collections::{BTreeSet, HashMap};

use crate::result::CaptureResult;

/// Tracks which frames have reached a terminal state.
///
/// The completed frame number only ever moves forward and means every frame
/// up to and including it has either produced a total result or failed.
/// Errors may be reported ahead of the frames before them, so they are held
/// back until the gap in front of them closes.
#[derive(Debug)]
pub(crate) struct FrameNumberTracker {
    completed_frame_number: i64,
    future_errors: BTreeSet<i64>,
    partial_results: HashMap<i64, Vec<CaptureResult>>,
}

impl Default for FrameNumberTracker {
    fn default() -> Self {
        Self {
            completed_frame_number: -1,
            future_errors: BTreeSet::new(),
            partial_results: HashMap::new(),
        }
    }
}

impl FrameNumberTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn drain_errors(&mut self) {
        let Some(next) = self.completed_frame_number.checked_add(1) else {
            // Nothing can be ahead of the last frame number
            self.future_errors.clear();
            return;
        };
        // Errors at or below the counter are already accounted for
        self.future_errors = self.future_errors.split_off(&next);
        while let Some(next) = self.completed_frame_number.checked_add(1) {
            if !self.future_errors.remove(&next) {
                break;
            }
            self.completed_frame_number = next;
        }
    }

    /// Record that `frame_number` reached its terminal state
    pub fn update_terminal(&mut self, frame_number: i64, is_error: bool) {
        if is_error {
            self.future_errors.insert(frame_number);
            // A failed frame never gets a total result to attach these to
            self.partial_results.remove(&frame_number);
        } else {
            // The service can't send a total result for frame N before every
            // frame prior to N has completed or failed.
            if self.completed_frame_number.checked_add(1) != Some(frame_number) {
                log::error!(
                    "result frame number {} comes out of order, should be {} + 1",
                    frame_number,
                    self.completed_frame_number
                );
            }
            // Advance anyway so a misbehaving service can't wedge sequences
            self.completed_frame_number = self.completed_frame_number.max(frame_number);
        }
        self.drain_errors();
    }

    /// Record a result for `frame_number`.
    ///
    /// Partial results are buffered until [`Self::pop_partial_results`]; a
    /// total result marks the frame as completed and discards anything still
    /// buffered for it.
    pub fn update_result(
        &mut self,
        frame_number: i64,
        result: Option<CaptureResult>,
        partial: bool,
    ) {
        if !partial {
            self.update_terminal(frame_number, false);
            self.partial_results.remove(&frame_number);
            return;
        }

        // Without a result there will be no total result either
        if let Some(result) = result {
            self.partial_results
                .entry(frame_number)
                .or_default()
                .push(result);
        }
    }

    /// Remove and return the partial results seen so far for `frame_number`,
    /// in the order they arrived
    pub fn pop_partial_results(&mut self, frame_number: i64) -> Vec<CaptureResult> {
        self.partial_results
            .remove(&frame_number)
            .unwrap_or_default()
    }

    pub fn completed_frame_number(&self) -> i64 {
        self.completed_frame_number
    }
}
