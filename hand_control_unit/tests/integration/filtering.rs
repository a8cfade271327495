//! Integration test: position/velocity estimation through the full cycle.

use std::time::Instant;

use hand_common::consts::MAX_JOINTS;
use hand_common::publish::NullPublisher;
use hand_control_unit::control::filters::DC_GAIN;
use hand_control_unit::control::torque::ZeroTorque;
use hand_control_unit::cycle::ControlLoop;
use proptest::prelude::*;

use super::support::{ScriptedBus, at, config};

const DT: f64 = 0.001;

fn single_joint_loop() -> (ControlLoop<ScriptedBus, ZeroTorque, NullPublisher>, Instant) {
    let mut cl = ControlLoop::new(&config(1), ScriptedBus::new(1), ZeroTorque, NullPublisher).unwrap();
    let t0 = Instant::now();
    cl.start_at(t0).unwrap();
    (cl, t0)
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn constant_input_converges() {
    let (mut cl, t0) = single_joint_loop();
    let c = 0.75;
    cl.bus_mut().set_all(c);
    for k in 1..=40 {
        cl.tick_at(at(t0, k)).unwrap();
    }
    let s = cl.joint_state();
    assert!((s.position_filtered()[0] - DC_GAIN * c).abs() < 1e-6);
    assert!((s.position_filtered()[0] - c).abs() / c < 0.025);
    assert!(s.velocity_filtered()[0].abs() < 1e-3);
}

#[test]
fn ramp_velocity_converges() {
    let (mut cl, t0) = single_joint_loop();
    let delta = 0.002;
    for k in 1..=300u32 {
        cl.bus_mut().set_all(f64::from(k) * delta);
        cl.tick_at(at(t0, k)).unwrap();
    }
    let ideal = delta / DT;
    let vf = cl.joint_state().velocity_filtered()[0];
    assert!((vf - DC_GAIN * DC_GAIN * ideal).abs() < 1e-6, "vf = {vf}");
    assert!((vf - ideal).abs() / ideal < 0.025);
}

#[test]
fn each_joint_is_filtered_independently() {
    let mut cl = ControlLoop::new(&config(3), ScriptedBus::new(3), ZeroTorque, NullPublisher).unwrap();
    let t0 = Instant::now();
    cl.start_at(t0).unwrap();
    cl.bus_mut().positions = vec![1.0, 0.0, -1.0];
    for k in 1..=60 {
        cl.tick_at(at(t0, k)).unwrap();
    }
    let pf = cl.joint_state().position_filtered();
    assert!((pf[0] - DC_GAIN).abs() < 1e-6);
    assert_eq!(pf[1], 0.0);
    assert!((pf[2] + DC_GAIN).abs() < 1e-6);
}

proptest! {
    #[test]
    fn recurrence_holds_every_cycle(samples in proptest::collection::vec(-3.0f64..3.0, 1..60)) {
        let (mut cl, t0) = single_joint_loop();
        let mut p_prev = 0.0;
        let mut pf_prev = 0.0;
        let mut v_prev = 0.0;
        let mut vf_prev = 0.0;

        for (k, p) in samples.iter().copied().enumerate() {
            cl.bus_mut().set_all(p);
            cl.tick_at(at(t0, k as u32 + 1)).unwrap();

            let pf = 0.6 * pf_prev + 0.198 * p_prev + 0.198 * p;
            let v = (pf - pf_prev) / DT;
            let vf = 0.6 * vf_prev + 0.198 * v_prev + 0.198 * v;

            let s = cl.joint_state();
            prop_assert!((s.position_filtered()[0] - pf).abs() < 1e-9);
            prop_assert!((s.velocity()[0] - v).abs() < 1e-6 * (1.0 + v.abs()));
            prop_assert!((s.velocity_filtered()[0] - vf).abs() < 1e-6 * (1.0 + vf.abs()));

            p_prev = p;
            pf_prev = pf;
            v_prev = v;
            vf_prev = vf;
        }
    }

    #[test]
    fn fresh_state_has_uniform_length_and_zero_torque(n in 1usize..=MAX_JOINTS) {
        let cl = ControlLoop::new(&config(n), ScriptedBus::new(n), ZeroTorque, NullPublisher).unwrap();
        let s = cl.joint_state();
        prop_assert_eq!(s.joint_count(), n);
        for seq in [
            s.position(),
            s.previous_position(),
            s.position_filtered(),
            s.previous_position_filtered(),
            s.velocity(),
            s.velocity_filtered(),
            s.previous_velocity(),
            s.desired_torque(),
        ] {
            prop_assert_eq!(seq.len(), n);
        }
        prop_assert!(s.desired_torque().iter().all(|t| *t == 0.0));
    }
}

#[test]
fn repeated_timestamp_keeps_velocity() {
    let (mut cl, t0) = single_joint_loop();
    cl.bus_mut().set_all(0.1);
    cl.tick_at(at(t0, 1)).unwrap();
    cl.bus_mut().set_all(0.3);
    cl.tick_at(at(t0, 2)).unwrap();
    let v = cl.joint_state().velocity()[0];
    let vf = cl.joint_state().velocity_filtered()[0];

    // Same instant again: dt = 0.
    cl.bus_mut().set_all(0.9);
    cl.tick_at(at(t0, 2)).unwrap();
    assert_eq!(cl.joint_state().velocity()[0], v);
    assert_eq!(cl.joint_state().velocity_filtered()[0], vf);
    assert_eq!(cl.joint_state().position()[0], 0.9);
    assert_eq!(cl.counters().velocity_holds, 1);
}
