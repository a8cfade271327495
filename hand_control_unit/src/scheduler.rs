//! Fixed-period pacing of the control loop.
//!
//! Deadlines are absolute on the monotonic clock, so pacing does not drift
//! with cycle execution time. When a cycle ends past the next deadline the
//! configured [`OverrunPolicy`] decides what happens to the missed ticks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use hand_common::bus::BusAdapter;
use hand_common::config::{ControlConfig, OverrunPolicy};
use hand_common::publish::Publisher;
use tracing::{info, warn};

use crate::control::torque::TorqueController;
use crate::cycle::{ControlLoop, CycleStats};
use crate::error::{ControlError, TimingOverrunWarning};
use crate::state::LoopState;

/// Compute the deadline following `deadline`, given that the cycle ended at
/// `now`. Returns the next deadline and the number of ticks dropped.
///
/// - On time (`now` ≤ `deadline + period`): `deadline + period`, nothing dropped.
/// - `BackToBack`: always `deadline + period`; missed ticks run immediately.
/// - `Skip`: the first period boundary strictly after `now`; every boundary in
///   between is dropped.
pub fn next_deadline(
    deadline: Instant,
    now: Instant,
    period: Duration,
    policy: OverrunPolicy,
) -> (Instant, u64) {
    let next = deadline + period;
    if now <= next || period.is_zero() {
        return (next, 0);
    }
    match policy {
        OverrunPolicy::BackToBack => (next, 0),
        OverrunPolicy::Skip => {
            let behind = now.duration_since(next).as_nanos();
            let missed = behind / period.as_nanos() + 1;
            let advance = period.as_nanos().saturating_mul(missed);
            let aligned = u64::try_from(advance)
                .ok()
                .and_then(|ns| next.checked_add(Duration::from_nanos(ns)))
                .unwrap_or(now + period);
            (aligned, u64::try_from(missed).unwrap_or(u64::MAX))
        }
    }
}

/// Sleep until `deadline`. Returns immediately if it already passed.
#[cfg(not(feature = "rt"))]
fn sleep_until(deadline: Instant) {
    if let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        std::thread::sleep(remaining);
    }
}

/// Sleep until `deadline` with `clock_nanosleep(CLOCK_MONOTONIC)`.
#[cfg(feature = "rt")]
fn sleep_until(deadline: Instant) {
    use nix::sys::time::TimeSpec;
    use nix::time::{ClockId, ClockNanosleepFlags, clock_nanosleep};

    if let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        let request = TimeSpec::from_duration(remaining);
        let _ = clock_nanosleep(
            ClockId::CLOCK_MONOTONIC,
            ClockNanosleepFlags::empty(),
            &request,
        );
    }
}

/// Drives a [`ControlLoop`] at a fixed period.
#[derive(Debug)]
pub struct Scheduler {
    period: Duration,
    policy: OverrunPolicy,
    running: Arc<AtomicBool>,
    max_cycles: Option<u64>,
    stats: CycleStats,
}

impl Scheduler {
    /// Create a scheduler with an explicit period and policy.
    pub fn new(period: Duration, policy: OverrunPolicy) -> Self {
        Self {
            period,
            policy,
            running: Arc::new(AtomicBool::new(true)),
            max_cycles: None,
            stats: CycleStats::new(),
        }
    }

    /// Create a scheduler from the `[control]` section.
    pub fn from_config(config: &ControlConfig) -> Self {
        Self::new(config.cycle_period(), config.overrun_policy)
    }

    /// Stop after `cycles` ticks.
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    /// Flag polled before every tick. Clearing it requests a graceful stop.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Request a graceful stop; takes effect before the next tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Configured period.
    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Configured overrun policy.
    #[inline]
    pub fn policy(&self) -> OverrunPolicy {
        self.policy
    }

    /// Timing statistics of the last run.
    #[inline]
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Run the loop until stopped, the cycle limit is reached, or a fatal
    /// error occurs.
    ///
    /// Starts the loop if it is still in `Init`. On a graceful exit the loop
    /// is stopped with zero torque; on a fatal error it is already `Stopped`
    /// and the error is returned.
    pub fn run<B, C, P>(&mut self, cl: &mut ControlLoop<B, C, P>) -> Result<(), ControlError>
    where
        B: BusAdapter,
        C: TorqueController,
        P: Publisher,
    {
        self.stats = CycleStats::new();

        let start = Instant::now();
        match cl.state() {
            LoopState::Init => cl.start_at(start)?,
            LoopState::Running => {}
            other => return Err(ControlError::NotRunning(other)),
        }

        info!(
            period_us = self.period.as_micros() as u64,
            policy = ?self.policy,
            max_cycles = ?self.max_cycles,
            "scheduler started"
        );

        let mut deadline = start + self.period;
        let outcome = loop {
            if !self.running.load(Ordering::Acquire) {
                break Ok(());
            }
            if self.max_cycles.is_some_and(|max| self.stats.cycle_count >= max) {
                break Ok(());
            }

            sleep_until(deadline);
            let wake = Instant::now();
            let latency = wake.saturating_duration_since(deadline);

            let result = cl.tick_at(wake);

            let end = Instant::now();
            let elapsed = end.saturating_duration_since(wake);
            self.stats
                .record(elapsed.as_nanos() as i64, latency.as_nanos() as i64);

            if let Err(e) = result {
                break Err(e);
            }

            let (next, skipped) = next_deadline(deadline, end, self.period, self.policy);
            if end > deadline + self.period {
                self.stats.record_overrun(skipped);
                let warning = TimingOverrunWarning {
                    frame: cl.counters().ticks,
                    late_by: end.saturating_duration_since(deadline),
                    budget: self.period,
                    skipped,
                };
                warn!(%warning, policy = ?self.policy, "timing overrun");
            }
            deadline = next;
        };

        match outcome {
            Ok(()) => {
                cl.stop()?;
                info!(
                    cycles = self.stats.cycle_count,
                    overruns = self.stats.overruns,
                    skipped = self.stats.skipped_ticks,
                    "scheduler finished"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
