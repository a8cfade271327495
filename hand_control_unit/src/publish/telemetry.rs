//! JSON-lines telemetry sink.
//!
//! Drains a snapshot channel on its own thread and writes one JSON object per
//! line. Ends when every sender is dropped.

use std::io::Write;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use hand_common::publish::JointStateSnapshot;
use tracing::{debug, warn};

use crate::error::ControlError;

/// Background writer for published snapshots.
pub struct TelemetryWriter {
    handle: JoinHandle<u64>,
}

impl TelemetryWriter {
    /// Spawn the writer. Only every `every_n`-th snapshot (by frame) is
    /// written; `every_n` of 0 or 1 writes all of them.
    pub fn spawn<W>(
        rx: Receiver<JointStateSnapshot>,
        writer: W,
        every_n: u64,
    ) -> Result<Self, ControlError>
    where
        W: Write + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name("hand-telemetry".into())
            .spawn(move || write_lines(rx, writer, every_n.max(1)))
            .map_err(|e| {
                ControlError::Initialization(format!("failed to spawn telemetry writer: {e}"))
            })?;
        Ok(Self { handle })
    }

    /// Wait for the channel to close and return the number of lines written.
    pub fn join(self) -> u64 {
        self.handle.join().unwrap_or_else(|_| {
            warn!("telemetry writer panicked");
            0
        })
    }
}

fn write_lines<W: Write>(rx: Receiver<JointStateSnapshot>, mut writer: W, every_n: u64) -> u64 {
    let mut written = 0u64;
    for snapshot in rx.iter() {
        if snapshot.frame % every_n != 0 {
            continue;
        }
        let line = match serde_json::to_string(&snapshot) {
            Ok(line) => line,
            Err(e) => {
                warn!(frame = snapshot.frame, error = %e, "snapshot serialization failed");
                continue;
            }
        };
        if let Err(e) = writeln!(writer, "{line}") {
            warn!(error = %e, "telemetry output closed");
            break;
        }
        written += 1;
    }
    let _ = writer.flush();
    debug!(written, "telemetry writer finished");
    written
}
