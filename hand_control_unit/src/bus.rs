//! Bus adapters shipped with the control unit.
//!
//! - [`timeout`] - Deadline-enforcing wrapper for adapters that may block
//! - [`sim`] - Simulated hand for running without hardware

pub mod sim;
pub mod timeout;

pub use sim::{FaultHandle, SimulatedHand};
pub use timeout::TimeoutBus;
