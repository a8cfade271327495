//! Bounded-queue publisher.
//!
//! The loop never blocks on a slow consumer: when the queue is full the
//! snapshot is dropped and `PublishError::QueueFull` is reported.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use hand_common::publish::{JointStateSnapshot, PublishError, Publisher};

/// Sending half of a snapshot queue.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: Sender<JointStateSnapshot>,
}

/// Create a publisher and its receiving end with room for `depth` snapshots.
pub fn channel(depth: usize) -> (ChannelPublisher, Receiver<JointStateSnapshot>) {
    let (tx, rx) = bounded(depth.max(1));
    (ChannelPublisher { tx }, rx)
}

impl Publisher for ChannelPublisher {
    fn emit(&mut self, snapshot: &JointStateSnapshot) -> Result<(), PublishError> {
        match self.tx.try_send(snapshot.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(PublishError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(PublishError::Disconnected),
        }
    }
}
