//! State-change events
//!
//! [`ChatEvent`] is the closed set of notifications the sync core emits, and
//! [`EventBus`] distributes them to the presentation layer.

mod bus;

pub use bus::{EventBus, Subscription};

use crate::chat::{Message, Snapshot};
use chrono::{DateTime, Utc};

/// Events emitted by the sync core
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A message was created through the write path
    MessageAdded {
        message: Message,
        /// When the event was emitted
        at: DateTime<Utc>,
    },

    /// A sync replaced the repository snapshot
    SyncCompleted {
        snapshot: Snapshot,
        /// Timestamp recorded as the new last-sync time
        synced_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    /// A sync or background operation failed
    Error {
        /// Human-readable summary
        message: String,
        /// Underlying cause
        cause: String,
        at: DateTime<Utc>,
    },
}

impl ChatEvent {
    pub fn message_added(message: Message) -> Self {
        ChatEvent::MessageAdded {
            message,
            at: Utc::now(),
        }
    }

    pub fn sync_completed(snapshot: Snapshot, synced_at: DateTime<Utc>) -> Self {
        ChatEvent::SyncCompleted {
            snapshot,
            synced_at,
            at: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>, cause: impl Into<String>) -> Self {
        ChatEvent::Error {
            message: message.into(),
            cause: cause.into(),
            at: Utc::now(),
        }
    }

    /// When the event was emitted
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ChatEvent::MessageAdded { at, .. }
            | ChatEvent::SyncCompleted { at, .. }
            | ChatEvent::Error { at, .. } => *at,
        }
    }

    /// Stable snake_case name, used in logs
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatEvent::MessageAdded { .. } => "message_added",
            ChatEvent::SyncCompleted { .. } => "sync_completed",
            ChatEvent::Error { .. } => "error",
        }
    }
}
