//! Chat data model
//!
//! Messages derived from remote issues, the immutable [`Snapshot`] a sync
//! produces, and the [`MessageRepository`] that holds the latest one.

mod message;
mod repository;

pub use message::{Label, Message, Snapshot};
pub use repository::MessageRepository;
