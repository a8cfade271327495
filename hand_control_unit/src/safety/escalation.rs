//! Bus failure escalation.
//!
//! A single failed read, write or fault poll is tolerated: the cycle carries
//! on with the previous state. Once `threshold` consecutive cycles have seen
//! at least one bus error the failure becomes fatal. Any fully successful
//! cycle resets the streak.

use hand_common::bus::BusError;

/// Bus health after recording one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusHealth {
    /// Every bus operation of the cycle succeeded.
    Healthy,
    /// The cycle saw an error, below the escalation threshold.
    Degraded {
        /// Current streak of failing cycles.
        consecutive: u32,
    },
    /// Threshold reached. The loop must stop.
    Failed {
        /// Current streak of failing cycles.
        consecutive: u32,
        /// Last error observed.
        last: BusError,
    },
}

/// Counts consecutive cycles with bus errors.
#[derive(Debug, Clone)]
pub struct BusFaultCounter {
    threshold: u32,
    consecutive: u32,
    total: u64,
}

impl BusFaultCounter {
    /// Create a counter escalating after `threshold` failing cycles (min 1).
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: 0,
            total: 0,
        }
    }

    /// Record the outcome of a cycle: `None` if all bus calls succeeded,
    /// otherwise the last error seen.
    pub fn record_cycle(&mut self, error: Option<BusError>) -> BusHealth {
        match error {
            None => {
                self.consecutive = 0;
                BusHealth::Healthy
            }
            Some(last) => {
                self.consecutive = self.consecutive.saturating_add(1);
                self.total += 1;
                if self.consecutive >= self.threshold {
                    BusHealth::Failed {
                        consecutive: self.consecutive,
                        last,
                    }
                } else {
                    BusHealth::Degraded {
                        consecutive: self.consecutive,
                    }
                }
            }
        }
    }

    /// Current streak of failing cycles.
    #[inline]
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Failing cycles since construction.
    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Escalation threshold.
    #[inline]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
