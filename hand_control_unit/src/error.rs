//! Control loop error taxonomy.
//!
//! Fatal errors stop the loop and are returned to the owner:
//! initialization failures, escalated bus failures, emergency stops.
//! Timing overruns are observational only and are logged as
//! [`TimingOverrunWarning`].

use std::time::Duration;

use hand_common::bus::BusError;
use hand_common::config::ConfigError;
use thiserror::Error;

use crate::state::lifecycle::LoopState;

/// Fatal control loop errors.
#[derive(Debug, Clone, Error)]
pub enum ControlError {
    /// Missing or invalid configuration, hand identity or joint count.
    /// The loop never starts.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// Bus I/O failed on too many consecutive cycles.
    #[error("bus communication failed on {consecutive} consecutive cycles: {source}")]
    BusCommunication {
        /// Number of consecutive failing cycles.
        consecutive: u32,
        /// Last error observed.
        #[source]
        source: BusError,
    },

    /// Hardware asserted its fault line.
    #[error("emergency stop asserted by hardware at frame {frame}")]
    EmergencyStop {
        /// Cycle in which the fault was observed.
        frame: u64,
    },

    /// `tick()` called while the loop is not running.
    #[error("control loop is not running (state: {0:?})")]
    NotRunning(LoopState),

    /// Lifecycle transition rejected.
    #[error("invalid lifecycle transition: {0}")]
    InvalidTransition(&'static str),

    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
}

impl From<ConfigError> for ControlError {
    fn from(e: ConfigError) -> Self {
        Self::Initialization(e.to_string())
    }
}

impl ControlError {
    /// Whether this error was raised by the hardware safety line.
    #[inline]
    pub fn is_emergency_stop(&self) -> bool {
        matches!(self, Self::EmergencyStop { .. })
    }
}

/// A cycle ended after the deadline of the following one. Non-fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "cycle {frame} overran: ended {}us after its deadline ({}us period), {skipped} tick(s) skipped",
    late_by.as_micros(),
    budget.as_micros()
)]
pub struct TimingOverrunWarning {
    /// Cycle that overran.
    pub frame: u64,
    /// Time from the scheduled deadline to the end of the cycle, wake
    /// latency included.
    pub late_by: Duration,
    /// Configured period.
    pub budget: Duration,
    /// Ticks dropped by the overrun policy as a consequence.
    pub skipped: u64,
}
