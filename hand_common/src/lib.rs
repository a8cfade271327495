//! Hand Common Library
//!
//! Shared constants, configuration loading and the capability traits that
//! connect the hand control loop to the outside world.
//!
//! # Module Structure
//!
//! - [`consts`] - Joint limits, timing defaults and the default joint table
//! - [`config`] - TOML configuration types, loading and validation
//! - [`bus`] - `BusAdapter` capability and `BusError`
//! - [`publish`] - `Publisher` capability and `JointStateSnapshot`
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use hand_common::prelude::*;
//!
//! let config = HandConfig::from_toml_str(
//!     r#"
//! [hand]
//! robot_name = "allegro_hand_right"
//! which_hand = "right"
//! "#,
//! )
//! .unwrap();
//! assert_eq!(config.control.joint_count(), DEFAULT_DOF);
//! ```

pub mod bus;
pub mod config;
pub mod consts;
pub mod prelude;
pub mod publish;

/// Fixed-capacity per-joint value array.
///
/// Sized for [`consts::MAX_JOINTS`] so that values can be copied between
/// threads and across the bus boundary without heap allocation.
pub type JointVec = heapless::Vec<f64, { consts::MAX_JOINTS }>;

/// Build a zero-filled [`JointVec`] of length `n`.
///
/// Returns `None` if `n` exceeds [`consts::MAX_JOINTS`].
pub fn zeroed_joints(n: usize) -> Option<JointVec> {
    let mut v = JointVec::new();
    v.resize(n, 0.0).ok()?;
    Some(v)
}
