use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// wedge loop state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    /// reading and typing
    Running = 0,
    /// the owner asked the loop to stop
    AbortRequested = 1,
    /// the loop has exited
    Stopped = 2,
}

impl LoopState {
    /// loop is running
    pub fn is_running(&self) -> bool {
        matches!(self, LoopState::Running)
    }

    /// abort is pending
    pub fn is_abort_requested(&self) -> bool {
        matches!(self, LoopState::AbortRequested)
    }

    /// loop is stopped
    pub fn is_stopped(&self) -> bool {
        matches!(self, LoopState::Stopped)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LoopState::Running,
            1 => LoopState::AbortRequested,
            _ => LoopState::Stopped,
        }
    }
}

/// Shared view of a loop's state.
///
/// The loop holds one clone and the owner another. Only the owner requests an
/// abort and only the loop marks itself stopped.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    state: Arc<AtomicU8>,
}

impl AbortHandle {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(LoopState::Running as u8)),
        }
    }

    /// current state
    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Asks the loop to stop after its current iteration.
    ///
    /// Never blocks. Calling it again, or after the loop stopped, changes
    /// nothing. Returns `true` if this call moved the loop out of `Running`.
    pub fn request_abort(&self) -> bool {
        self.state
            .compare_exchange(
                LoopState::Running as u8,
                LoopState::AbortRequested as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn mark_stopped(&self) {
        self.state.store(LoopState::Stopped as u8, Ordering::Release);
    }
}
