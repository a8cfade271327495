//! Integration test: configuration and initialization.

use hand_common::config::{ConfigError, HandConfig};
use hand_common::consts::{DEFAULT_DOF, DEFAULT_JOINT_NAMES};
use hand_common::publish::NullPublisher;
use hand_control_unit::bus::{SimulatedHand, TimeoutBus};
use hand_control_unit::control::torque::ZeroTorque;
use hand_control_unit::cycle::ControlLoop;
use hand_control_unit::error::ControlError;
use hand_control_unit::state::LoopState;
use std::io::Write;

use super::support::{ScriptedBus, config};

const HAND_TOML: &str = r#"
[hand]
robot_name   = "allegro_hand_right"
which_hand   = "right"
manufacturer = "Wonik Robotics"
serial       = "SAH030XXXXX"
version      = 4.0

[control]
cycle_time_us  = 1000
bus_timeout_us = 9000
overrun_policy = "back_to_back"
"#;

fn init_error(cfg: &HandConfig, n: usize) -> ControlError {
    match ControlLoop::new(cfg, ScriptedBus::new(n), ZeroTorque, NullPublisher) {
        Ok(_) => panic!("expected initialization failure"),
        Err(e) => e,
    }
}

#[test]
fn loads_file_and_starts_on_simulated_hand() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(HAND_TOML.as_bytes()).unwrap();

    let cfg = HandConfig::load(file.path()).unwrap();
    assert_eq!(cfg.control.joint_count(), DEFAULT_DOF);
    assert_eq!(cfg.control.joint_names[0], DEFAULT_JOINT_NAMES[0]);

    let hand = SimulatedHand::new(cfg.control.joint_count(), cfg.control.cycle_period()).unwrap();
    let bus = TimeoutBus::spawn(hand, cfg.control.bus_timeout()).unwrap();
    let mut cl = ControlLoop::new(&cfg, bus, ZeroTorque, NullPublisher).unwrap();
    assert_eq!(cl.state(), LoopState::Init);
    cl.start().unwrap();
    for _ in 0..5 {
        cl.tick().unwrap();
    }
    cl.stop().unwrap();
    assert_eq!(cl.counters().ticks, 5);
    assert_eq!(cl.counters().bus_error_cycles, 0);
}

#[test]
fn config_errors_are_initialization_errors() {
    let mut cfg = config(4);
    cfg.control.cycle_time_us = 50;
    assert!(matches!(init_error(&cfg, 4), ControlError::Initialization(_)));

    let mut cfg = config(4);
    cfg.control.dof = Some(5);
    assert!(matches!(init_error(&cfg, 4), ControlError::Initialization(_)));

    let mut cfg = config(2);
    cfg.control.joint_names = vec!["thumb".into(), "thumb".into()];
    assert!(matches!(init_error(&cfg, 2), ControlError::Initialization(_)));

    let mut cfg = config(2);
    cfg.hand.robot_name = "  ".into();
    assert!(matches!(init_error(&cfg, 2), ControlError::Initialization(_)));
}

#[test]
fn adapter_joint_count_must_match() {
    let err = init_error(&config(16), 12);
    match err {
        ControlError::Initialization(msg) => assert!(msg.contains("12")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn load_errors_convert() {
    let err = HandConfig::load(std::path::Path::new("/nonexistent/hand.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    let err: ControlError = err.into();
    assert!(matches!(err, ControlError::Initialization(_)));
}
