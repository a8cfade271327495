//! Joint position and velocity estimation.
//!
//! Both signals go through the same three-tap low-pass recurrence:
//!
//! ```text
//! y[k] = 0.6·y[k-1] + 0.198·x[k-1] + 0.198·x[k]
//! ```
//!
//! Velocity is the finite difference of the *filtered* position over the
//! measured cycle time:
//!
//! ```text
//! v[k] = (pf[k] - pf[k-1]) / dt
//! ```
//!
//! The taps sum to 0.996, so the DC gain is 0.99 rather than 1: a constant
//! input settles at 99% of its value and a ramp's velocity at 0.99² of its
//! slope.

use crate::state::JointState;

/// Weight of the previous filtered output.
pub const FILTER_DECAY: f64 = 0.6;

/// Weight of the current and previous raw input.
pub const FILTER_GAIN: f64 = 0.198;

/// Steady-state gain of [`low_pass`].
pub const DC_GAIN: f64 = 2.0 * FILTER_GAIN / (1.0 - FILTER_DECAY);

/// One step of the low-pass recurrence.
#[inline]
pub fn low_pass(prev_filtered: f64, prev_raw: f64, raw: f64) -> f64 {
    FILTER_DECAY * prev_filtered + FILTER_GAIN * prev_raw + FILTER_GAIN * raw
}

/// Outcome of the velocity part of an estimator update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityUpdate {
    /// Velocity recomputed from the new sample.
    Computed,
    /// `dt` was not usable; previous velocity kept.
    Held,
}

/// Advance the estimator by one cycle.
///
/// `raw` holds the positions just read from the bus; `dt` is the measured
/// time since the previous filtered sample in seconds. When `dt` is zero, negative or
/// not finite, positions are still filtered but raw and filtered velocity are
/// left unchanged.
pub fn estimate(state: &mut JointState, raw: &[f64], dt: f64) -> VelocityUpdate {
    debug_assert_eq!(raw.len(), state.joint_count());

    let dt_ok = dt.is_finite() && dt > 0.0;
    let n = state.joint_count().min(raw.len());

    for i in 0..n {
        // Save last iteration.
        state.previous_position[i] = state.position[i];
        state.previous_position_filtered[i] = state.position_filtered[i];
        state.previous_velocity[i] = state.velocity[i];

        state.position[i] = raw[i];
        state.position_filtered[i] = low_pass(
            state.previous_position_filtered[i],
            state.previous_position[i],
            state.position[i],
        );

        if dt_ok {
            state.velocity[i] =
                (state.position_filtered[i] - state.previous_position_filtered[i]) / dt;
            state.velocity_filtered[i] = low_pass(
                state.velocity_filtered[i],
                state.previous_velocity[i],
                state.velocity[i],
            );
        }
    }

    state.frame += 1;

    if dt_ok {
        VelocityUpdate::Computed
    } else {
        VelocityUpdate::Held
    }
}
