//! Integration test: bus communication failures.
//!
//! Failures below `max_consecutive_bus_errors` are absorbed; reaching it is
//! fatal; a fully successful cycle resets the streak.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use hand_common::bus::{BusAdapter, BusError};
use hand_common::publish::NullPublisher;
use hand_control_unit::bus::TimeoutBus;
use hand_control_unit::control::filters::DC_GAIN;
use hand_control_unit::control::torque::{ZeroTorque, from_fn};
use hand_control_unit::cycle::ControlLoop;
use hand_control_unit::error::ControlError;
use hand_control_unit::state::{JointState, LoopState};

use super::support::{RecordingPublisher, ScriptedBus, at, config};

#[test]
fn failures_below_threshold_are_absorbed() {
    let mut bus = ScriptedBus::new(2);
    bus.fail_reads = 2;
    let mut cl = ControlLoop::new(&config(2), bus, ZeroTorque, RecordingPublisher::default()).unwrap();
    cl.start().unwrap();

    cl.tick().unwrap();
    cl.tick().unwrap();
    // Failed reads skip filtering and the write.
    assert!(cl.bus().written.is_empty());
    assert_eq!(cl.joint_state().frame(), 0);

    cl.tick().unwrap();
    assert_eq!(cl.bus().written.len(), 1);
    assert_eq!(cl.counters().bus_error_cycles, 2);
    assert_eq!(cl.state(), LoopState::Running);
    // Publishing continued throughout.
    assert_eq!(cl.publisher().snapshots.len(), 3);
}

#[test]
fn threshold_is_fatal() {
    let mut bus = ScriptedBus::new(2);
    bus.fail_writes = 10;
    let mut cl = ControlLoop::new(&config(2), bus, ZeroTorque, NullPublisher).unwrap();
    cl.start().unwrap();

    cl.tick().unwrap();
    cl.tick().unwrap();
    let err = cl.tick().unwrap_err();
    match err {
        ControlError::BusCommunication { consecutive, source } => {
            assert_eq!(consecutive, 3);
            assert!(matches!(source, BusError::Communication(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(cl.state(), LoopState::Stopped);
    assert!(cl.faulted());
}

#[test]
fn successful_cycle_resets_streak() {
    let mut cfg = config(1);
    cfg.control.max_consecutive_bus_errors = 2;
    let mut cl = ControlLoop::new(&cfg, ScriptedBus::new(1), ZeroTorque, NullPublisher).unwrap();
    cl.start().unwrap();

    for _ in 0..5 {
        cl.bus_mut().fail_polls = 1;
        cl.tick().unwrap();
        cl.tick().unwrap();
    }
    assert_eq!(cl.counters().bus_error_cycles, 5);
    assert!(cl.is_running());

    cl.bus_mut().fail_polls = 2;
    cl.tick().unwrap();
    assert!(matches!(
        cl.tick(),
        Err(ControlError::BusCommunication { consecutive: 2, source: BusError::Disconnected })
    ));
}

#[test]
fn failed_poll_after_failed_read_counts_once() {
    let mut bus = ScriptedBus::new(1);
    bus.fail_reads = 1;
    bus.fail_polls = 1;
    let mut cl = ControlLoop::new(&config(1), bus, ZeroTorque, NullPublisher).unwrap();
    cl.start().unwrap();
    cl.tick().unwrap();
    assert_eq!(cl.counters().bus_error_cycles, 1);
    // The fault line is still polled after a failed read.
    assert_eq!(cl.bus().polls, 1);
}

#[test]
fn controller_is_skipped_when_read_fails() {
    let mut bus = ScriptedBus::new(1);
    bus.fail_reads = 1;
    let mut calls = 0u32;
    {
        let ctrl = from_fn(|_: &JointState, _: &mut [f64]| calls += 1);
        let mut cl = ControlLoop::new(&config(1), bus, ctrl, NullPublisher).unwrap();
        cl.start().unwrap();
        cl.tick().unwrap();
        cl.tick().unwrap();
    }
    assert_eq!(calls, 1);
}

#[test]
fn velocity_after_failed_read_spans_both_samples() {
    let delta = 0.001;
    let mut cl = ControlLoop::new(&config(1), ScriptedBus::new(1), ZeroTorque, NullPublisher).unwrap();
    let t0 = Instant::now();
    cl.start_at(t0).unwrap();
    for k in 1..200u32 {
        cl.bus_mut().set_all(f64::from(k) * delta);
        cl.tick_at(at(t0, k)).unwrap();
    }
    let steady = cl.joint_state().velocity()[0];
    assert!((steady - DC_GAIN * delta / 0.001).abs() < 1e-6, "steady = {steady}");
    let pf_before = cl.joint_state().position_filtered()[0];

    cl.bus_mut().fail_reads = 1;
    cl.bus_mut().set_all(200.0 * delta);
    cl.tick_at(at(t0, 200)).unwrap();
    cl.bus_mut().set_all(201.0 * delta);
    cl.tick_at(at(t0, 201)).unwrap();

    // The filtered position moved over two periods, not one.
    let pf_after = cl.joint_state().position_filtered()[0];
    let v = cl.joint_state().velocity()[0];
    assert!((v - (pf_after - pf_before) / 0.002).abs() < 1e-9, "v = {v}");
    assert!(v > 0.0 && v < steady, "v = {v} overshoots {steady}");

    for k in 202..=260u32 {
        cl.bus_mut().set_all(f64::from(k) * delta);
        cl.tick_at(at(t0, k)).unwrap();
    }
    let v = cl.joint_state().velocity()[0];
    assert!((v - steady).abs() < 1e-6, "v = {v}");
}

/// Adapter whose every call blocks while `stall` is set.
struct StallingBus {
    stall: Arc<AtomicBool>,
}

impl StallingBus {
    fn wait(&self) {
        while self.stall.load(Ordering::Acquire) {
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl BusAdapter for StallingBus {
    fn joint_count(&self) -> usize {
        2
    }
    fn read_joint_positions(&mut self, positions: &mut [f64]) -> Result<(), BusError> {
        self.wait();
        positions.fill(0.0);
        Ok(())
    }
    fn write_joint_torques(&mut self, _torques: &[f64]) -> Result<(), BusError> {
        self.wait();
        Ok(())
    }
    fn poll_fault_status(&mut self) -> Result<bool, BusError> {
        self.wait();
        Ok(false)
    }
}

#[test]
fn stalled_adapter_times_out_within_budget() {
    let stall = Arc::new(AtomicBool::new(true));
    let budget = Duration::from_millis(5);
    let mut bus = TimeoutBus::spawn(
        StallingBus {
            stall: Arc::clone(&stall),
        },
        budget,
    )
    .unwrap();

    let mut buf = [0.0; 2];
    let started = Instant::now();
    let err = bus.read_joint_positions(&mut buf).unwrap_err();
    let waited = started.elapsed();
    assert!(err.is_timeout());
    assert!(waited >= budget);
    assert!(waited < budget + Duration::from_millis(100), "waited {waited:?}");

    stall.store(false, Ordering::Release);
}

#[test]
fn stalled_adapter_escalates_through_loop() {
    let stall = Arc::new(AtomicBool::new(true));
    let mut cfg = config(2);
    cfg.control.bus_timeout_us = 2000;
    let bus = TimeoutBus::spawn(
        StallingBus {
            stall: Arc::clone(&stall),
        },
        cfg.control.bus_timeout(),
    )
    .unwrap();
    let mut cl = ControlLoop::new(&cfg, bus, ZeroTorque, NullPublisher).unwrap();
    cl.start().unwrap();

    cl.tick().unwrap();
    cl.tick().unwrap();
    match cl.tick() {
        Err(ControlError::BusCommunication { consecutive, source }) => {
            assert_eq!(consecutive, 3);
            assert!(source.is_timeout());
        }
        other => panic!("expected bus failure, got {other:?}"),
    }
    assert_eq!(cl.state(), LoopState::Stopped);

    stall.store(false, Ordering::Release);
}
