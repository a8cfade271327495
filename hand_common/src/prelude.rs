//! Common re-exports.
//!
//! ```rust
//! use hand_common::prelude::*;
//! ```

pub use crate::bus::{BusAdapter, BusError};
pub use crate::config::{ConfigError, ControlConfig, HandConfig, HandInfo, Handedness, OverrunPolicy};
pub use crate::consts::{CYCLE_TIME_US, DEFAULT_DOF, DEFAULT_JOINT_NAMES, MAX_JOINTS};
pub use crate::publish::{JointStateSnapshot, NullPublisher, PublishError, Publisher};
pub use crate::{JointVec, zeroed_joints};
