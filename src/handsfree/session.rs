//! Per-conversation dialog state

use super::recording::CaptureBuffer;
use super::state::DialogState;
use std::time::Instant;

/// The live state of one conversation
///
/// Owned by the manager and only touched from the task running the
/// conversation. `reset` returns it to a fresh `Idle` session.
#[derive(Debug)]
pub struct DialogSession {
    state: DialogState,
    state_entered_at: Instant,
    buffer: CaptureBuffer,
    draft: Option<String>,
    retries: u32,
}

impl Default for DialogSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogSession {
    pub fn new() -> Self {
        Self {
            state: DialogState::Idle,
            state_entered_at: Instant::now(),
            buffer: CaptureBuffer::new(),
            draft: None,
            retries: 0,
        }
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    /// Time spent in the current state
    pub fn time_in_state(&self) -> std::time::Duration {
        self.state_entered_at.elapsed()
    }

    /// Move to `state`; returns the previous state
    ///
    /// Entering a state, including re-entering the current one after a
    /// recognised answer, clears the retry counter.
    pub fn enter(&mut self, state: DialogState) -> DialogState {
        let previous = self.state;
        self.retries = 0;
        self.state = state;
        self.state_entered_at = Instant::now();
        previous
    }

    /// Count one re-prompt in the current state and return the new total
    pub fn record_retry(&mut self) -> u32 {
        self.retries += 1;
        self.retries
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn buffer_mut(&mut self) -> &mut CaptureBuffer {
        &mut self.buffer
    }

    pub fn draft(&self) -> Option<&str> {
        self.draft.as_deref()
    }

    pub fn set_draft(&mut self, draft: String) {
        self.draft = Some(draft);
    }

    /// Discard everything and return to `Idle`; returns the previous state
    pub fn reset(&mut self) -> DialogState {
        let previous = self.state;
        *self = Self::new();
        previous
    }
}
