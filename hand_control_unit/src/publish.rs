//! Publisher adapters.
//!
//! - [`channel`] - Bounded queue to a consumer thread
//! - [`shared`] - Latest snapshot behind a read-write lock
//! - [`telemetry`] - JSON-lines writer draining a channel

pub mod channel;
pub mod shared;
pub mod telemetry;

pub use channel::{ChannelPublisher, channel};
pub use shared::SharedSnapshot;
pub use telemetry::TelemetryWriter;
