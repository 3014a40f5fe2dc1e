//! Sync engine
//!
//! Keeps the [`MessageRepository`](crate::chat::MessageRepository) in step with
//! the remote issue tracker.
//!
//! ## Cycle
//!
//! 1. **Guard**: reject the trigger with [`SyncError::Busy`] if a sync is in flight
//! 2. **Fetch**: list the most recent open issues through the transport
//! 3. **Check**: drop the result with [`SyncError::Superseded`] if the
//!    repository or credentials changed while fetching
//! 4. **Map**: build messages, flagging those created since the previous sync
//! 5. **Swap**: replace the repository snapshot wholesale
//! 6. **Notify**: publish `SyncCompleted` (or `Error` on failure)
//!
//! # Example
//!
//! ```ignore
//! use issuechat::sync::SyncEngine;
//!
//! let engine = Arc::new(SyncEngine::new(transport, config, repository, bus));
//! engine.sync_once().await?;
//! engine.start_periodic(std::time::Duration::from_secs(30));
//! ```

mod engine;

pub use engine::{SyncEngine, SyncState, DEFAULT_SYNC_INTERVAL};

use crate::transport::TransportError;
use thiserror::Error;

/// Sync and write-path errors
#[derive(Debug, Error)]
pub enum SyncError {
    /// A sync is already running. Not a failure: the trigger was dropped.
    #[error("A sync is already in progress")]
    Busy,

    /// The repository or credentials changed while the request was in
    /// flight. The result was discarded.
    #[error("Sync result discarded: configuration changed during the request")]
    Superseded,

    /// Network or HTTP failure from the transport
    #[error("Transport failure: {0}")]
    Transport(TransportError),

    /// Credentials rejected or access insufficient
    #[error("Access denied: {0}")]
    Auth(String),

    /// Malformed local input
    #[error("Invalid input: {0}")]
    Validation(String),
}

impl SyncError {
    pub fn is_busy(&self) -> bool {
        matches!(self, SyncError::Busy)
    }

    /// Whether the trigger was dropped without touching the snapshot
    pub fn is_soft(&self) -> bool {
        matches!(self, SyncError::Busy | SyncError::Superseded)
    }
}

impl From<TransportError> for SyncError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Unauthorized(msg) => SyncError::Auth(msg),
            other => SyncError::Transport(other),
        }
    }
}
