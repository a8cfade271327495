//! Hardware bus capability and error types.
//!
//! This module defines:
//! - `BusAdapter` trait - Interface the control loop uses to talk to the hand
//! - `BusError` enum - Error types for bus operations
//!
//! The wire-level driver (CAN, EtherCAT, simulation, ...) lives behind the
//! trait. The control loop assumes nothing about the transport.

use std::time::Duration;
use thiserror::Error;

/// Error types for bus operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Transient transport failure.
    #[error("bus communication error: {0}")]
    Communication(String),

    /// Operation did not complete within its deadline.
    #[error("bus {operation} timed out after {}us", budget.as_micros())]
    Timeout {
        /// Which operation stalled.
        operation: &'static str,
        /// Deadline that was exceeded.
        budget: Duration,
    },

    /// The adapter is gone (worker exited, device unplugged).
    #[error("bus adapter disconnected")]
    Disconnected,

    /// Buffer length does not match the adapter's joint count.
    #[error("joint count mismatch: expected {expected}, got {actual}")]
    JointCountMismatch {
        /// Joints driven by the adapter.
        expected: usize,
        /// Length supplied by the caller.
        actual: usize,
    },
}

impl BusError {
    /// Whether the error is a deadline expiry.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Interface to the hand's communication bus.
///
/// # Timing Contracts
///
/// | Operation | Max Duration | RT Constraint |
/// |-----------|--------------|---------------|
/// | `read_joint_positions()` | well under one period | **HARD** |
/// | `write_joint_torques()` | well under one period | **HARD** |
/// | `poll_fault_status()` | well under one period | **HARD** |
///
/// An implementation that may block indefinitely must be wrapped in a
/// timeout adapter before it is handed to the control loop.
pub trait BusAdapter: Send {
    /// Number of joints this adapter drives.
    fn joint_count(&self) -> usize;

    /// Read the latest joint positions [rad] into `positions`.
    ///
    /// `positions.len()` must equal [`joint_count`](Self::joint_count).
    fn read_joint_positions(&mut self, positions: &mut [f64]) -> Result<(), BusError>;

    /// Command joint torques. On error the command is considered not applied.
    fn write_joint_torques(&mut self, torques: &[f64]) -> Result<(), BusError>;

    /// Whether the hardware currently asserts its fault (emergency stop) line.
    fn poll_fault_status(&mut self) -> Result<bool, BusError>;
}

impl<B: BusAdapter + ?Sized> BusAdapter for Box<B> {
    fn joint_count(&self) -> usize {
        (**self).joint_count()
    }

    fn read_joint_positions(&mut self, positions: &mut [f64]) -> Result<(), BusError> {
        (**self).read_joint_positions(positions)
    }

    fn write_joint_torques(&mut self, torques: &[f64]) -> Result<(), BusError> {
        (**self).write_joint_torques(torques)
    }

    fn poll_fault_status(&mut self) -> Result<bool, BusError> {
        (**self).poll_fault_status()
    }
}

/// Check that a caller buffer matches the adapter's joint count.
#[inline]
pub fn check_len(expected: usize, actual: usize) -> Result<(), BusError> {
    if expected == actual {
        Ok(())
    } else {
        Err(BusError::JointCountMismatch { expected, actual })
    }
}
