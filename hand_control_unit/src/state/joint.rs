//! Per-joint runtime state for one hand.
//!
//! Created once at startup with every value zeroed, mutated in place by the
//! control loop exactly once per cycle, discarded at shutdown. All arrays are
//! fixed-capacity and share the same length N for the lifetime of the state.

use std::sync::Arc;
use std::time::Instant;

use hand_common::consts::MAX_JOINTS;
use hand_common::publish::JointStateSnapshot;
use hand_common::{JointVec, zeroed_joints};

use crate::error::ControlError;

/// Mutable per-joint record owned by the control loop.
#[derive(Debug, Clone)]
pub struct JointState {
    names: Arc<[String]>,

    // ── Position ──
    pub(crate) position: JointVec,
    pub(crate) previous_position: JointVec,
    pub(crate) position_filtered: JointVec,
    pub(crate) previous_position_filtered: JointVec,

    // ── Velocity ──
    pub(crate) velocity: JointVec,
    pub(crate) velocity_filtered: JointVec,
    pub(crate) previous_velocity: JointVec,

    // ── Command ──
    pub(crate) desired_torque: JointVec,

    /// Time of the last filter update.
    pub(crate) stamp: Option<Instant>,
    /// Number of completed filter updates.
    pub(crate) frame: u64,
}

impl JointState {
    /// Create a zeroed state for the given joint labels.
    ///
    /// # Errors
    /// `ControlError::Initialization` if the table is empty or longer than
    /// [`MAX_JOINTS`].
    pub fn new(names: Arc<[String]>) -> Result<Self, ControlError> {
        let n = names.len();
        let zero = match zeroed_joints(n) {
            Some(v) if n > 0 => v,
            _ => {
                return Err(ControlError::Initialization(format!(
                    "joint count {n} out of range [1, {MAX_JOINTS}]"
                )));
            }
        };

        Ok(Self {
            names,
            position: zero.clone(),
            previous_position: zero.clone(),
            position_filtered: zero.clone(),
            previous_position_filtered: zero.clone(),
            velocity: zero.clone(),
            velocity_filtered: zero.clone(),
            previous_velocity: zero.clone(),
            desired_torque: zero,
            stamp: None,
            frame: 0,
        })
    }

    /// Create a state from string labels.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ControlError> {
        let names: Vec<String> = names.iter().map(|s| s.as_ref().to_string()).collect();
        Self::new(Arc::from(names))
    }

    /// Number of joints N.
    #[inline]
    pub fn joint_count(&self) -> usize {
        self.names.len()
    }

    /// Joint labels in bus order.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Raw position read this cycle.
    #[inline]
    pub fn position(&self) -> &[f64] {
        &self.position
    }

    /// Raw position read in the previous cycle.
    #[inline]
    pub fn previous_position(&self) -> &[f64] {
        &self.previous_position
    }

    /// Low-pass filtered position.
    #[inline]
    pub fn position_filtered(&self) -> &[f64] {
        &self.position_filtered
    }

    /// Filtered position of the previous cycle.
    #[inline]
    pub fn previous_position_filtered(&self) -> &[f64] {
        &self.previous_position_filtered
    }

    /// Raw velocity estimate.
    #[inline]
    pub fn velocity(&self) -> &[f64] {
        &self.velocity
    }

    /// Low-pass filtered velocity.
    #[inline]
    pub fn velocity_filtered(&self) -> &[f64] {
        &self.velocity_filtered
    }

    /// Raw velocity of the previous cycle.
    #[inline]
    pub fn previous_velocity(&self) -> &[f64] {
        &self.previous_velocity
    }

    /// Torque computed for the current cycle.
    #[inline]
    pub fn desired_torque(&self) -> &[f64] {
        &self.desired_torque
    }

    /// Time of the last filter update (`None` before the first cycle).
    #[inline]
    pub fn stamp(&self) -> Option<Instant> {
        self.stamp
    }

    /// Number of completed filter updates.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Replace the commanded torque. Length must equal N.
    pub(crate) fn set_desired_torque(&mut self, torque: &[f64]) {
        debug_assert_eq!(torque.len(), self.desired_torque.len());
        self.desired_torque.copy_from_slice(torque);
    }

    /// Zero the commanded torque.
    pub(crate) fn zero_torque(&mut self) {
        self.desired_torque.fill(0.0);
    }

    /// Copy filtered position, filtered velocity and torque for publishing.
    pub fn snapshot(&self, frame: u64, stamp_us: u64) -> JointStateSnapshot {
        JointStateSnapshot {
            frame,
            stamp_us,
            names: Arc::clone(&self.names),
            position: self.position_filtered.clone(),
            velocity: self.velocity_filtered.clone(),
            effort: self.desired_torque.clone(),
        }
    }
}
