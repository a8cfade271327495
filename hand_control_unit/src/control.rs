//! Control module root.
//!
//! Position/velocity estimation and the pluggable torque law.

pub mod filters;
pub mod torque;
