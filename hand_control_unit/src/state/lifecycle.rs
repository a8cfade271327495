//! Control loop lifecycle: Init → Running → Stopping → Stopped.
//!
//! `Stopped` is terminal. A fault and a stop request both pass through
//! `Stopping` so that the loop gets one place to zero its torque output.

/// Loop lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoopState {
    /// Constructed, not yet ticking.
    #[default]
    Init,
    /// Ticks are being executed.
    Running,
    /// No further ticks; shutdown in progress.
    Stopping,
    /// Terminal.
    Stopped,
}

/// Event that can trigger a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    /// Scheduler starts ticking.
    Start,
    /// Owner requested a graceful stop.
    StopRequested,
    /// Emergency stop or escalated bus failure.
    Fault,
    /// Shutdown work finished.
    Drained,
}

/// Result of a lifecycle transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition succeeded, new state.
    Ok(LoopState),
    /// Transition rejected, with reason.
    Rejected(&'static str),
}

/// Lifecycle manager holding the current state.
#[derive(Debug, Clone, Default)]
pub struct LoopStateMachine {
    state: LoopState,
    faulted: bool,
}

impl LoopStateMachine {
    /// Create a state machine in `Init`.
    pub const fn new() -> Self {
        Self {
            state: LoopState::Init,
            faulted: false,
        }
    }

    /// Current state.
    #[inline]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Whether the loop left `Running` because of a fault.
    #[inline]
    pub const fn faulted(&self) -> bool {
        self.faulted
    }

    /// Whether ticks may execute.
    #[inline]
    pub const fn is_running(&self) -> bool {
        matches!(self.state, LoopState::Running)
    }

    /// Attempt a transition given an event.
    pub fn handle_event(&mut self, event: LoopEvent) -> TransitionResult {
        use LoopEvent::*;
        use LoopState::*;

        let next = match (self.state, event) {
            (Init, Start) => Running,
            (Init | Running, StopRequested) => Stopping,
            (Init | Running | Stopping, Fault) => {
                self.faulted = true;
                Stopping
            }
            (Stopping, StopRequested) => Stopping,
            (Stopping, Drained) => Stopped,
            (Stopped, _) => return TransitionResult::Rejected("Stopped is terminal"),
            (Running, Start) => return TransitionResult::Rejected("already running"),
            (Stopping, Start) => return TransitionResult::Rejected("cannot restart while stopping"),
            (Init | Running, Drained) => {
                return TransitionResult::Rejected("Drained only valid while stopping");
            }
        };

        self.state = next;
        TransitionResult::Ok(next)
    }
}
