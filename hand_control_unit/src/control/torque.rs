//! Pluggable torque control law.
//!
//! The loop owns one [`TorqueController`] chosen at construction and calls it
//! exactly once per cycle, after filtering and before the bus write. Concrete
//! laws (PD, gravity compensation, grasping, ...) are supplied by the
//! integrator; only the zero-torque baseline lives here.

use crate::state::JointState;

/// Strategy computing the desired joint torque from the current state.
pub trait TorqueController {
    /// Write one torque per joint into `torque` (length N, pre-zeroed).
    fn compute_desired_torque(&mut self, state: &JointState, torque: &mut [f64]);

    /// Short name for logs.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<T: TorqueController + ?Sized> TorqueController for Box<T> {
    fn compute_desired_torque(&mut self, state: &JointState, torque: &mut [f64]) {
        (**self).compute_desired_torque(state, torque)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Commands zero torque on every joint (the hand goes limp).
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroTorque;

impl TorqueController for ZeroTorque {
    fn compute_desired_torque(&mut self, _state: &JointState, torque: &mut [f64]) {
        torque.fill(0.0);
    }

    fn name(&self) -> &str {
        "zero_torque"
    }
}

/// Controller backed by a closure. Build with [`from_fn`].
pub struct FnController<F> {
    f: F,
}

impl<F> TorqueController for FnController<F>
where
    F: FnMut(&JointState, &mut [f64]),
{
    fn compute_desired_torque(&mut self, state: &JointState, torque: &mut [f64]) {
        (self.f)(state, torque)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// Wrap a closure as a [`TorqueController`].
///
/// ```
/// use hand_control_unit::control::torque::{from_fn, TorqueController};
/// use hand_control_unit::state::JointState;
///
/// let kd = 0.05;
/// let mut damping = from_fn(move |s: &JointState, tau: &mut [f64]| {
///     for (t, v) in tau.iter_mut().zip(s.velocity_filtered()) {
///         *t = -kd * v;
///     }
/// });
/// let state = JointState::from_names(&["j0"]).unwrap();
/// let mut tau = [0.0];
/// damping.compute_desired_torque(&state, &mut tau);
/// assert_eq!(tau, [0.0]);
/// ```
pub fn from_fn<F>(f: F) -> FnController<F>
where
    F: FnMut(&JointState, &mut [f64]),
{
    FnController { f }
}

/// Replace non-finite torques by zero. Returns the number replaced.
pub(crate) fn sanitize(torque: &mut [f64]) -> usize {
    let mut replaced = 0;
    for t in torque.iter_mut() {
        if !t.is_finite() {
            *t = 0.0;
            replaced += 1;
        }
    }
    replaced
}
