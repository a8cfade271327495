//! Simulated hand.
//!
//! Every joint is a damped rotational inertia driven by the commanded torque,
//! integrated with semi-implicit Euler once per write. The fault line can be
//! asserted from another thread through a [`FaultHandle`] or automatically
//! after a number of polls.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hand_common::bus::{BusAdapter, BusError, check_len};
use hand_common::{JointVec, zeroed_joints};
use tracing::{info, trace};

use crate::error::ControlError;

/// Joint inertia [kg·m²].
pub const SIM_INERTIA: f64 = 0.01;

/// Viscous damping [N·m·s/rad].
pub const SIM_DAMPING: f64 = 0.05;

/// Shared handle to the simulated emergency-stop line.
#[derive(Debug, Clone, Default)]
pub struct FaultHandle(Arc<AtomicBool>);

impl FaultHandle {
    /// Assert the fault line.
    pub fn trip(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Release the fault line.
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Whether the line is asserted.
    pub fn is_asserted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// [`BusAdapter`] backed by a per-joint dynamics model.
#[derive(Debug)]
pub struct SimulatedHand {
    position: JointVec,
    velocity: JointVec,
    dt: f64,
    fault: FaultHandle,
    trip_after: Option<u64>,
    polls: u64,
    writes: u64,
}

impl SimulatedHand {
    /// Create a hand with `joints` joints at rest at zero, stepped by `step`.
    pub fn new(joints: usize, step: Duration) -> Result<Self, ControlError> {
        let zero = zeroed_joints(joints)
            .filter(|_| joints > 0)
            .ok_or_else(|| {
                ControlError::Initialization(format!("simulated hand cannot have {joints} joints"))
            })?;
        Ok(Self {
            position: zero.clone(),
            velocity: zero,
            dt: step.as_secs_f64(),
            fault: FaultHandle::default(),
            trip_after: None,
            polls: 0,
            writes: 0,
        })
    }

    /// Assert the fault line on the `cycles`-th poll.
    pub fn with_trip_after(mut self, cycles: u64) -> Self {
        self.trip_after = Some(cycles);
        self
    }

    /// Start from the given joint positions.
    pub fn with_initial_positions(mut self, positions: &[f64]) -> Result<Self, ControlError> {
        check_len(self.position.len(), positions.len())
            .map_err(|e| ControlError::Initialization(e.to_string()))?;
        self.position.copy_from_slice(positions);
        Ok(self)
    }

    /// Handle for asserting the fault line from elsewhere.
    pub fn fault_handle(&self) -> FaultHandle {
        self.fault.clone()
    }

    /// Current simulated positions.
    pub fn positions(&self) -> &[f64] {
        &self.position
    }

    /// Current simulated velocities.
    pub fn velocities(&self) -> &[f64] {
        &self.velocity
    }

    /// Number of torque commands applied.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl BusAdapter for SimulatedHand {
    fn joint_count(&self) -> usize {
        self.position.len()
    }

    fn read_joint_positions(&mut self, positions: &mut [f64]) -> Result<(), BusError> {
        check_len(self.position.len(), positions.len())?;
        positions.copy_from_slice(&self.position);
        Ok(())
    }

    fn write_joint_torques(&mut self, torques: &[f64]) -> Result<(), BusError> {
        check_len(self.position.len(), torques.len())?;
        for ((p, v), tau) in self
            .position
            .iter_mut()
            .zip(self.velocity.iter_mut())
            .zip(torques)
        {
            let accel = (tau - SIM_DAMPING * *v) / SIM_INERTIA;
            *v += accel * self.dt;
            *p += *v * self.dt;
        }
        self.writes += 1;
        trace!(writes = self.writes, "simulated torque applied");
        Ok(())
    }

    fn poll_fault_status(&mut self) -> Result<bool, BusError> {
        self.polls += 1;
        if self.trip_after.is_some_and(|n| self.polls >= n) && !self.fault.is_asserted() {
            info!(poll = self.polls, "simulated fault line asserted");
            self.fault.trip();
        }
        Ok(self.fault.is_asserted())
    }
}
