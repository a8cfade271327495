//! State module root.
//!
//! Per-joint mutable record and the loop lifecycle state machine.

pub mod joint;
pub mod lifecycle;

pub use joint::JointState;
pub use lifecycle::{LoopEvent, LoopState, LoopStateMachine, TransitionResult};
