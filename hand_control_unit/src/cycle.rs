//! One control cycle: read → filter → compute → write → safety → publish.
//!
//! [`ControlLoop`] owns the bus, the torque controller, the publisher and the
//! per-joint state. Each [`tick`](ControlLoop::tick) runs exactly one cycle
//! synchronously; pacing is the [`Scheduler`](crate::scheduler::Scheduler)'s
//! job.
//!
//! ## Cycle Body
//! 1. Read raw joint positions. On failure, skip 2–4.
//! 2. Filter position and velocity with the measured `dt`.
//! 3. Compute desired torque; non-finite values are replaced by zero.
//! 4. Write torque to the bus.
//! 5. Poll the fault line (always, even after a failed read).
//! 6. Publish the end-of-cycle snapshot (best effort).
//! 7. Stop on emergency stop or escalated bus failure.
//!
//! No heap allocation happens inside a cycle: all buffers are fixed-capacity
//! and the snapshot shares the joint-name table by `Arc`.

use std::sync::Arc;
use std::time::Instant;

use hand_common::bus::{BusAdapter, BusError};
use hand_common::config::HandConfig;
use hand_common::publish::Publisher;
use hand_common::{JointVec, zeroed_joints};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::control::filters::{self, VelocityUpdate};
use crate::control::torque::{self, TorqueController};
use crate::error::ControlError;
use crate::safety::{BusFaultCounter, BusHealth, SafetyMonitor, SafetyVerdict};
use crate::state::{JointState, LoopEvent, LoopState, LoopStateMachine, TransitionResult};

/// Log the first publish failure and then every this many.
const PUBLISH_WARN_EVERY: u64 = 1000;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
///
/// Updated every cycle with no allocation. Provides min/max/avg/stddev
/// for cycle latency monitoring and overrun detection.
#[derive(Debug, Clone, Serialize)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Running sum of squares for stddev computation.
    pub sum_sq_cycle_ns: i128,
    /// Number of overruns detected.
    pub overruns: u64,
    /// Ticks dropped by the skip policy.
    pub skipped_ticks: u64,
    /// Maximum wake-up latency [ns] (time between expected and actual wake).
    pub max_latency_ns: i64,
}

impl CycleStats {
    /// Create a new zeroed stats instance.
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            sum_sq_cycle_ns: 0,
            overruns: 0,
            skipped_ticks: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        if duration_ns < self.min_cycle_ns {
            self.min_cycle_ns = duration_ns;
        }
        if duration_ns > self.max_cycle_ns {
            self.max_cycle_ns = duration_ns;
        }
        self.sum_cycle_ns += duration_ns;
        self.sum_sq_cycle_ns += (duration_ns as i128) * (duration_ns as i128);
        if latency_ns > self.max_latency_ns {
            self.max_latency_ns = latency_ns;
        }
    }

    /// Record an overrun and the ticks it caused to be skipped.
    #[inline]
    pub fn record_overrun(&mut self, skipped: u64) {
        self.overruns += 1;
        self.skipped_ticks += skipped;
    }

    /// Average cycle time [ns] (returns 0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }

    /// Standard deviation of the cycle time [ns] (0 with fewer than 2 cycles).
    pub fn stddev_cycle_ns(&self) -> f64 {
        if self.cycle_count < 2 {
            return 0.0;
        }
        let n = self.cycle_count as f64;
        let mean = self.sum_cycle_ns as f64 / n;
        let var = (self.sum_sq_cycle_ns as f64 / n) - mean * mean;
        var.max(0.0).sqrt()
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Functional counters kept by the loop itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopCounters {
    /// Cycles executed (including the one that stopped the loop).
    pub ticks: u64,
    /// Cycles with at least one failed bus operation.
    pub bus_error_cycles: u64,
    /// Failed publisher emits.
    pub publish_errors: u64,
    /// Cycles in which `dt` was unusable and velocity was held.
    pub velocity_holds: u64,
    /// Non-finite controller outputs replaced by zero.
    pub sanitized_torques: u64,
}

// ─── Control Loop ──────────────────────────────────────────────────

/// Fixed-period torque control loop for one hand.
///
/// Generic over the bus, the control law and the telemetry sink so that the
/// cycle is monomorphized; boxed trait objects work as well.
pub struct ControlLoop<B, C, P> {
    bus: B,
    controller: C,
    publisher: P,

    state: JointState,
    lifecycle: LoopStateMachine,
    safety: SafetyMonitor,
    bus_health: BusFaultCounter,
    counters: LoopCounters,

    /// Bus read scratch.
    raw: JointVec,
    /// Controller output scratch.
    torque: JointVec,

    started_at: Option<Instant>,
}

impl<B, C, P> ControlLoop<B, C, P>
where
    B: BusAdapter,
    C: TorqueController,
    P: Publisher,
{
    /// Build a loop from a validated configuration.
    ///
    /// # Errors
    /// `ControlError::Initialization` if the configuration is invalid or the
    /// adapter drives a different number of joints than configured.
    pub fn new(config: &HandConfig, bus: B, controller: C, publisher: P) -> Result<Self, ControlError> {
        config.validate()?;

        let n = config.control.joint_count();
        if bus.joint_count() != n {
            return Err(ControlError::Initialization(format!(
                "bus adapter drives {} joints but {n} are configured",
                bus.joint_count()
            )));
        }

        let names: Arc<[String]> = Arc::from(config.control.joint_names.clone());
        let state = JointState::new(names)?;
        let zero = zeroed_joints(n).ok_or_else(|| {
            ControlError::Initialization(format!("joint count {n} exceeds capacity"))
        })?;

        info!(
            robot = %config.hand.robot_name,
            hand = ?config.hand.which_hand,
            manufacturer = %config.hand.manufacturer,
            serial = %config.hand.serial,
            version = config.hand.version,
            joints = n,
            cycle_time_us = config.control.cycle_time_us,
            controller = controller.name(),
            "control loop initialized"
        );

        Ok(Self {
            bus,
            controller,
            publisher,
            state,
            lifecycle: LoopStateMachine::new(),
            safety: SafetyMonitor::new(),
            bus_health: BusFaultCounter::new(config.control.max_consecutive_bus_errors),
            counters: LoopCounters::default(),
            raw: zero.clone(),
            torque: zero,
            started_at: None,
        })
    }

    /// Enter `Running`. `now` is the reference for the first `dt` and for
    /// snapshot timestamps.
    pub fn start_at(&mut self, now: Instant) -> Result<(), ControlError> {
        self.transition(LoopEvent::Start)?;
        self.started_at = Some(now);
        debug!("control loop running");
        Ok(())
    }

    /// Enter `Running` now.
    pub fn start(&mut self) -> Result<(), ControlError> {
        self.start_at(Instant::now())
    }

    /// Run one cycle stamped with the current time.
    pub fn tick(&mut self) -> Result<(), ControlError> {
        self.tick_at(Instant::now())
    }

    /// Run one cycle stamped with `now`.
    ///
    /// # Errors
    /// - `NotRunning` if the loop is not in `Running`.
    /// - `EmergencyStop` if the hardware asserted its fault line; the loop is
    ///   `Stopped` on return.
    /// - `BusCommunication` once bus errors reach the escalation threshold;
    ///   the loop is `Stopped` on return.
    pub fn tick_at(&mut self, now: Instant) -> Result<(), ControlError> {
        if !self.lifecycle.is_running() {
            return Err(ControlError::NotRunning(self.lifecycle.state()));
        }

        self.counters.ticks += 1;
        let frame = self.counters.ticks;

        let mut bus_error: Option<BusError> = None;

        // ═══ READ ═══
        match self.bus.read_joint_positions(&mut self.raw) {
            Ok(()) => {
                // ═══ FILTER ═══
                // dt spans the two filtered samples, not the tick period.
                let dt = self
                    .state
                    .stamp
                    .or(self.started_at)
                    .map_or(0.0, |prev| now.saturating_duration_since(prev).as_secs_f64());
                if filters::estimate(&mut self.state, &self.raw, dt) == VelocityUpdate::Held {
                    self.counters.velocity_holds += 1;
                }
                self.state.stamp = Some(now);

                // ═══ COMPUTE ═══
                self.torque.fill(0.0);
                self.controller
                    .compute_desired_torque(&self.state, &mut self.torque);
                let replaced = torque::sanitize(&mut self.torque);
                if replaced > 0 {
                    self.counters.sanitized_torques += replaced as u64;
                    warn!(
                        frame,
                        replaced,
                        controller = self.controller.name(),
                        "non-finite torque replaced by zero"
                    );
                }
                self.state.set_desired_torque(&self.torque);

                // ═══ WRITE ═══
                if let Err(e) = self.bus.write_joint_torques(self.state.desired_torque()) {
                    warn!(frame, error = %e, "torque write failed, command not applied");
                    bus_error = Some(e);
                }
            }
            Err(e) => {
                warn!(frame, error = %e, "joint position read failed, cycle skipped");
                bus_error = Some(e);
            }
        }

        // ═══ SAFETY ═══
        let fault = match self.bus.poll_fault_status() {
            Ok(asserted) => asserted,
            Err(e) => {
                warn!(frame, error = %e, "fault status poll failed");
                bus_error = Some(e);
                false
            }
        };
        let verdict = self.safety.evaluate(fault, frame);

        if bus_error.is_some() {
            self.counters.bus_error_cycles += 1;
        }
        let health = self.bus_health.record_cycle(bus_error);

        // ═══ PUBLISH ═══
        let stamp_us = self.started_at.map_or(0, |t0| {
            u64::try_from(now.saturating_duration_since(t0).as_micros()).unwrap_or(u64::MAX)
        });
        let snapshot = self.state.snapshot(frame, stamp_us);
        if let Err(e) = self.publisher.emit(&snapshot) {
            self.counters.publish_errors += 1;
            let count = self.counters.publish_errors;
            if count == 1 || count % PUBLISH_WARN_EVERY == 0 {
                warn!(frame, error = %e, count, "joint state publish failed");
            }
        }

        // ═══ STOP ═══
        if let SafetyVerdict::EmergencyStop { frame: tripped } = verdict {
            self.halt()?;
            error!(frame = tripped, "emergency stop asserted by hardware, control loop stopped");
            return Err(ControlError::EmergencyStop { frame: tripped });
        }
        if let BusHealth::Failed { consecutive, last } = health {
            self.halt()?;
            error!(consecutive, error = %last, "bus failure escalated, control loop stopped");
            return Err(ControlError::BusCommunication {
                consecutive,
                source: last,
            });
        }

        Ok(())
    }

    /// Graceful stop: command zero torque (best effort) and enter `Stopped`.
    ///
    /// No-op if the loop already stopped.
    pub fn stop(&mut self) -> Result<(), ControlError> {
        match self.lifecycle.state() {
            LoopState::Stopped => return Ok(()),
            LoopState::Init => {}
            LoopState::Running | LoopState::Stopping => {
                self.state.zero_torque();
                if let Err(e) = self.bus.write_joint_torques(self.state.desired_torque()) {
                    warn!(error = %e, "zero torque write on stop failed");
                }
            }
        }
        self.transition(LoopEvent::StopRequested)?;
        self.transition(LoopEvent::Drained)?;
        info!(ticks = self.counters.ticks, "control loop stopped");
        Ok(())
    }

    /// Fault path: zero the command without touching the bus, then stop.
    fn halt(&mut self) -> Result<(), ControlError> {
        self.state.zero_torque();
        self.transition(LoopEvent::Fault)?;
        self.transition(LoopEvent::Drained)?;
        Ok(())
    }

    fn transition(&mut self, event: LoopEvent) -> Result<LoopState, ControlError> {
        match self.lifecycle.handle_event(event) {
            TransitionResult::Ok(state) => Ok(state),
            TransitionResult::Rejected(reason) => Err(ControlError::InvalidTransition(reason)),
        }
    }

    // ── Accessors ──

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> LoopState {
        self.lifecycle.state()
    }

    /// Whether ticks may execute.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Whether the loop stopped because of a fault.
    #[inline]
    pub fn faulted(&self) -> bool {
        self.lifecycle.faulted()
    }

    /// Per-joint state.
    #[inline]
    pub fn joint_state(&self) -> &JointState {
        &self.state
    }

    /// Functional counters.
    #[inline]
    pub fn counters(&self) -> &LoopCounters {
        &self.counters
    }

    /// Bus adapter.
    #[inline]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Bus adapter (mutable).
    #[inline]
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Torque controller.
    #[inline]
    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Telemetry sink.
    #[inline]
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Consume the loop and return the bus, controller and publisher.
    pub fn into_parts(self) -> (B, C, P) {
        (self.bus, self.controller, self.publisher)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
