//! Workspace-wide constants.
//!
//! Single source of truth for joint limits, timing bounds and defaults.

use static_assertions::const_assert;

/// Maximum number of joints a single hand may expose.
pub const MAX_JOINTS: usize = 32;

/// Default number of actuated joints (four fingers × four joints).
pub const DEFAULT_DOF: usize = 16;

/// Default control period in microseconds (1 kHz).
pub const CYCLE_TIME_US: u32 = 1000;

/// Minimum accepted control period [µs].
pub const CYCLE_TIME_US_MIN: u32 = 100;

/// Maximum accepted control period [µs].
pub const CYCLE_TIME_US_MAX: u32 = 100_000;

/// Default deadline for a single bus operation [µs].
pub const BUS_TIMEOUT_US_DEFAULT: u32 = 500;

/// Consecutive failing cycles before a bus error becomes fatal.
pub const MAX_CONSECUTIVE_BUS_ERRORS_DEFAULT: u32 = 3;

/// Depth of the outbound joint-state queue.
pub const PUBLISH_QUEUE_DEPTH: usize = 3;

/// Joint names of the default 16-DOF hand, in bus order.
///
/// Must match the joint names of the robot description.
pub const DEFAULT_JOINT_NAMES: [&str; DEFAULT_DOF] = [
    "index_joint_0",
    "index_joint_1",
    "index_joint_2",
    "index_joint_3",
    "middle_joint_0",
    "middle_joint_1",
    "middle_joint_2",
    "middle_joint_3",
    "ring_joint_0",
    "ring_joint_1",
    "ring_joint_2",
    "ring_joint_3",
    "thumb_joint_0",
    "thumb_joint_1",
    "thumb_joint_2",
    "thumb_joint_3",
];

const_assert!(DEFAULT_DOF <= MAX_JOINTS);
const_assert!(CYCLE_TIME_US_MIN <= CYCLE_TIME_US && CYCLE_TIME_US <= CYCLE_TIME_US_MAX);
const_assert!(PUBLISH_QUEUE_DEPTH > 0);
