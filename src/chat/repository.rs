//! Message repository
//!
//! Holds the snapshot produced by the latest successful sync. Replacement is a
//! pointer swap, so readers never observe a partially updated snapshot.

use super::message::{Message, Snapshot};
use std::sync::RwLock;

/// Current view of the remote collection
#[derive(Debug, Default)]
pub struct MessageRepository {
    snapshot: RwLock<Snapshot>,
}

impl MessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot (cheap clone of the shared storage)
    pub fn snapshot(&self) -> Snapshot {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Swap in a new snapshot, returning the previous one
    pub fn replace(&self, snapshot: Snapshot) -> Snapshot {
        let mut guard = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tracing::debug!(
            previous = guard.len(),
            current = snapshot.len(),
            "Replacing message snapshot"
        );
        std::mem::replace(&mut *guard, snapshot)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of messages created since the previous sync
    pub fn new_count(&self) -> usize {
        self.snapshot().new_count()
    }

    pub fn find(&self, id: u64) -> Option<Message> {
        self.snapshot().get(id).cloned()
    }
}
