//! Emergency-stop detection.
//!
//! The hardware fault line is polled once per cycle. The first asserted poll
//! trips the monitor; the trip is latched and there is no way to clear or
//! bypass it short of constructing a new loop.

/// Result of evaluating the fault line for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    /// No fault; the loop keeps running.
    Clear,
    /// Fault asserted (now or earlier); the loop must stop.
    EmergencyStop {
        /// Cycle in which the fault was first observed.
        frame: u64,
    },
}

/// Latching emergency-stop monitor.
#[derive(Debug, Clone, Default)]
pub struct SafetyMonitor {
    tripped_at: Option<u64>,
}

impl SafetyMonitor {
    /// Create an untripped monitor.
    pub const fn new() -> Self {
        Self { tripped_at: None }
    }

    /// Feed this cycle's fault status.
    pub fn evaluate(&mut self, fault_asserted: bool, frame: u64) -> SafetyVerdict {
        if self.tripped_at.is_none() && fault_asserted {
            self.tripped_at = Some(frame);
        }
        match self.tripped_at {
            Some(frame) => SafetyVerdict::EmergencyStop { frame },
            None => SafetyVerdict::Clear,
        }
    }

    /// Whether the monitor has tripped.
    #[inline]
    pub const fn is_tripped(&self) -> bool {
        self.tripped_at.is_some()
    }

    /// Cycle of the first trip, if any.
    #[inline]
    pub const fn tripped_at(&self) -> Option<u64> {
        self.tripped_at
    }
}
