//! Latest-value snapshot shared with other threads.

use std::sync::Arc;

use hand_common::publish::{JointStateSnapshot, PublishError, Publisher};
use parking_lot::RwLock;

/// Holds the most recent snapshot. Clones share the same slot.
///
/// The snapshot is copied before the write lock is taken; the lock covers
/// only the swap.
#[derive(Debug, Clone, Default)]
pub struct SharedSnapshot {
    slot: Arc<RwLock<Option<JointStateSnapshot>>>,
}

impl SharedSnapshot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the latest snapshot, if any was published.
    pub fn latest(&self) -> Option<JointStateSnapshot> {
        self.slot.read().clone()
    }

    /// Frame number of the latest snapshot.
    pub fn frame(&self) -> Option<u64> {
        self.slot.read().as_ref().map(|s| s.frame)
    }
}

impl Publisher for SharedSnapshot {
    fn emit(&mut self, snapshot: &JointStateSnapshot) -> Result<(), PublishError> {
        let copy = Some(snapshot.clone());
        let _old = std::mem::replace(&mut *self.slot.write(), copy);
        Ok(())
    }
}
