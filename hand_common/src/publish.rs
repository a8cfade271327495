//! Telemetry egress capability.
//!
//! The control loop hands a [`JointStateSnapshot`] to a [`Publisher`] once per
//! cycle. Publishing is best effort: a failed emit is logged by the caller and
//! never retried inside the cycle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::JointVec;

/// Error types for publishing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Outbound queue is full; the snapshot was dropped.
    #[error("publish queue full, snapshot dropped")]
    QueueFull,

    /// Consumer side has gone away.
    #[error("publish channel disconnected")]
    Disconnected,

    /// Transport-specific failure.
    #[error("publish failed: {0}")]
    Transport(String),
}

/// Owned copy of the joint state taken at the end of a cycle.
///
/// Positions and velocities are the filtered values; effort is the torque
/// commanded in the same cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointStateSnapshot {
    /// Cycle number the snapshot belongs to (1-based).
    pub frame: u64,
    /// Microseconds since the loop started.
    pub stamp_us: u64,
    /// Joint labels, shared with the loop's state.
    pub names: Arc<[String]>,
    /// Filtered joint positions [rad].
    pub position: JointVec,
    /// Filtered joint velocities [rad/s].
    pub velocity: JointVec,
    /// Commanded torque.
    pub effort: JointVec,
}

impl JointStateSnapshot {
    /// Number of joints in the snapshot.
    #[inline]
    pub fn joint_count(&self) -> usize {
        self.names.len()
    }
}

/// Sink for per-cycle joint state.
///
/// Must be non-blocking or bounded in time: it runs inside the control cycle.
pub trait Publisher {
    /// Publish one snapshot. The snapshot's `stamp_us` is the cycle timestamp.
    fn emit(&mut self, snapshot: &JointStateSnapshot) -> Result<(), PublishError>;
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn emit(&mut self, snapshot: &JointStateSnapshot) -> Result<(), PublishError> {
        (**self).emit(snapshot)
    }
}

/// Fan out to two publishers. Both are always attempted; the first error wins.
impl<A: Publisher, B: Publisher> Publisher for (A, B) {
    fn emit(&mut self, snapshot: &JointStateSnapshot) -> Result<(), PublishError> {
        let first = self.0.emit(snapshot);
        let second = self.1.emit(snapshot);
        first.and(second)
    }
}

/// Publisher that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPublisher;

impl Publisher for NullPublisher {
    fn emit(&mut self, _snapshot: &JointStateSnapshot) -> Result<(), PublishError> {
        Ok(())
    }
}
