//! IssueChat - chat room backed by GitHub Issues
//!
//! Each message is an issue in a configured repository. The crate keeps a
//! local snapshot of recent messages in step with the remote tracker and tells
//! interested parties when it changes.
//!
//! # Architecture
//!
//! - **transport**: Issue tracker abstraction and the GitHub REST adapter
//! - **chat**: Message, snapshot and the in-memory message repository
//! - **events**: Typed change events and the synchronous event bus
//! - **sync**: Single-flight sync engine with periodic polling and the write path
//! - **supervisor**: Connection state machine, exponential backoff, heartbeat
//! - **query**: Pure search/filter/sort and statistics over snapshots
//! - **client**: Composition of the above for one repository
//! - **config**: ~/.config/issuechat/config.yaml handling and validation

// Core modules
pub mod chat;
pub mod config;
pub mod error;
pub mod events;
pub mod transport;

// Components
pub mod client;
pub mod query;
pub mod supervisor;
pub mod sync;

// Ambient
pub mod logging;
pub mod metrics;

// Re-exports
pub use client::ChatClient;
pub use error::{IssueChatError, Result};
