//! Safety module root.
//!
//! Hardware emergency-stop latch and bus failure escalation.

pub mod escalation;
pub mod monitor;

pub use escalation::{BusFaultCounter, BusHealth};
pub use monitor::{SafetyMonitor, SafetyVerdict};
