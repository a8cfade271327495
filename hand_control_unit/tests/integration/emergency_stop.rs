//! Integration test: hardware emergency stop.
//!
//! 1. Fault asserted in cycle k → `EmergencyStop`, state `Stopped`
//! 2. No cycle k+1 touches the bus
//! 3. Torque written equals torque published, including cycle k

use std::time::{Duration, Instant};

use hand_common::config::Handedness;
use hand_common::config::HandConfig;
use hand_control_unit::bus::SimulatedHand;
use hand_control_unit::control::torque::from_fn;
use hand_control_unit::cycle::ControlLoop;
use hand_control_unit::error::ControlError;
use hand_control_unit::publish::SharedSnapshot;
use hand_control_unit::scheduler::Scheduler;
use hand_control_unit::state::{JointState, LoopState};

use super::support::{RecordingPublisher, ScriptedBus, at, config};

fn spring() -> impl FnMut(&JointState, &mut [f64]) {
    |s: &JointState, tau: &mut [f64]| {
        for (t, p) in tau.iter_mut().zip(s.position_filtered()) {
            *t = 0.5 - 2.0 * p;
        }
    }
}

#[test]
fn fault_stops_loop_in_same_cycle() {
    let mut bus = ScriptedBus::new(2);
    bus.fault_at_poll = Some(3);
    let mut cl = ControlLoop::new(&config(2), bus, from_fn(spring()), RecordingPublisher::default()).unwrap();
    let t0 = Instant::now();
    cl.start_at(t0).unwrap();

    cl.tick_at(at(t0, 1)).unwrap();
    cl.tick_at(at(t0, 2)).unwrap();
    let err = cl.tick_at(at(t0, 3)).unwrap_err();
    assert!(matches!(err, ControlError::EmergencyStop { frame: 3 }));
    assert!(err.is_emergency_stop());
    assert_eq!(cl.state(), LoopState::Stopped);
    assert!(cl.faulted());

    // No further cycle reaches the bus.
    assert!(matches!(
        cl.tick_at(at(t0, 4)),
        Err(ControlError::NotRunning(LoopState::Stopped))
    ));
    assert_eq!(cl.bus().reads, 3);
    assert_eq!(cl.bus().polls, 3);

    // Outgoing torque is zeroed for the cycle that never comes.
    assert!(cl.joint_state().desired_torque().iter().all(|t| *t == 0.0));
}

#[test]
fn written_torque_matches_published_torque() {
    let mut bus = ScriptedBus::new(2);
    bus.fault_at_poll = Some(5);
    let mut cl = ControlLoop::new(&config(2), bus, from_fn(spring()), RecordingPublisher::default()).unwrap();
    let t0 = Instant::now();
    cl.start_at(t0).unwrap();

    for k in 1..=5 {
        cl.bus_mut().set_all(f64::from(k) * 0.1);
        let _ = cl.tick_at(at(t0, k));
    }

    let written = &cl.bus().written;
    let published = &cl.publisher().snapshots;
    assert_eq!(written.len(), 5);
    assert_eq!(published.len(), 5);
    for (k, (w, p)) in written.iter().zip(published).enumerate() {
        assert_eq!(p.frame, k as u64 + 1);
        assert_eq!(&w[..], &p.effort[..], "cycle {}", k + 1);
    }
    // The faulting cycle still published a non-trivial command.
    assert!(published[4].effort.iter().any(|t| *t != 0.0));
}

#[test]
fn stop_cannot_clear_a_trip() {
    let mut bus = ScriptedBus::new(1);
    bus.fault_at_poll = Some(1);
    let mut cl = ControlLoop::new(&config(1), bus, from_fn(spring()), RecordingPublisher::default()).unwrap();
    cl.start().unwrap();
    assert!(cl.tick().is_err());
    cl.stop().unwrap();
    assert_eq!(cl.state(), LoopState::Stopped);
    assert!(cl.start().is_err());
}

#[test]
fn scheduler_returns_emergency_stop_from_simulated_hand() {
    let mut cfg = HandConfig::with_identity("allegro_hand_left", Handedness::Left);
    cfg.control.cycle_time_us = 500;
    let hand = SimulatedHand::new(cfg.control.joint_count(), cfg.control.cycle_period())
        .unwrap()
        .with_trip_after(5);
    let shared = SharedSnapshot::new();
    let mut cl = ControlLoop::new(&cfg, hand, from_fn(spring()), shared.clone()).unwrap();
    let mut scheduler = Scheduler::from_config(&cfg.control).with_max_cycles(100);

    let started = Instant::now();
    let err = scheduler.run(&mut cl).unwrap_err();
    assert!(matches!(err, ControlError::EmergencyStop { frame: 5 }));
    assert_eq!(scheduler.stats().cycle_count, 5);
    assert_eq!(cl.state(), LoopState::Stopped);
    assert_eq!(shared.frame(), Some(5));
    assert!(started.elapsed() < Duration::from_secs(1));
}
