//! # Hand Control Unit Library
//!
//! Fixed-period torque control loop for a multi-jointed robotic hand.
//! Every cycle reads joint positions from the bus, low-pass filters position
//! and velocity, asks a pluggable control law for torques, writes them back,
//! checks the hardware emergency-stop line and publishes the joint state.
//!
//! ## Layers
//!
//! 1. **Scheduler**: absolute-deadline pacing, overrun policy, stop flag
//! 2. **ControlLoop**: one synchronous cycle, lifecycle, error escalation
//! 3. **Estimator / TorqueController**: per-joint signal processing and law
//! 4. **BusAdapter / Publisher**: hardware and telemetry capabilities
//!
//! ## Zero-Allocation Cycle
//!
//! Joint state and scratch buffers are fixed-capacity arrays sized at
//! startup. A cycle performs no heap allocation unless a publisher or bus
//! adapter does.
//!
//! ```rust
//! use hand_common::prelude::*;
//! use hand_control_unit::bus::SimulatedHand;
//! use hand_control_unit::control::torque::ZeroTorque;
//! use hand_control_unit::cycle::ControlLoop;
//!
//! let config = HandConfig::with_identity("allegro_hand_right", Handedness::Right);
//! let hand = SimulatedHand::new(DEFAULT_DOF, config.control.cycle_period()).unwrap();
//! let mut cl = ControlLoop::new(&config, hand, ZeroTorque, NullPublisher).unwrap();
//! cl.start().unwrap();
//! cl.tick().unwrap();
//! cl.stop().unwrap();
//! ```

pub mod bus;
pub mod control;
pub mod cycle;
pub mod error;
pub mod publish;
pub mod rt;
pub mod safety;
pub mod scheduler;
pub mod state;
