//! Chat message and snapshot types
//!
//! A [`Message`] is an immutable view of one remote issue. A [`Snapshot`] is the
//! ordered, immutable collection of messages produced by one sync.

use crate::transport::{IssueRecord, RecordLabel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;

/// Label attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<RecordLabel> for Label {
    fn from(label: RecordLabel) -> Self {
        Self {
            name: label.name,
            color: label.color,
            description: label.description,
        }
    }
}

/// A chat message backed by a remote issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Remote issue id (unique, stable)
    pub id: u64,

    pub title: String,

    /// Issue body; empty when the issue has none
    pub body: String,

    /// Author login
    pub author: String,

    /// Author avatar URL
    pub author_avatar: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Number of comments on the issue
    pub comment_count: u32,

    /// Created after the previous successful sync
    pub is_new: bool,

    pub labels: Vec<Label>,
}

impl Message {
    /// Build a message from a transport record.
    ///
    /// `last_sync` is the timestamp of the *previous* successful sync, so the
    /// "new" flag survives exactly one sync cycle. Without a previous sync
    /// nothing is new.
    pub fn from_record(record: IssueRecord, last_sync: Option<DateTime<Utc>>) -> Self {
        let is_new = last_sync.is_some_and(|since| record.created_at > since);

        Self {
            id: record.id,
            title: record.title,
            body: record.body.unwrap_or_default(),
            author: record.author.name,
            author_avatar: record.author.avatar_ref,
            created_at: record.created_at,
            updated_at: record.updated_at,
            comment_count: record.comment_count,
            is_new,
            labels: record.labels.into_iter().map(Label::from).collect(),
        }
    }

    pub fn has_comments(&self) -> bool {
        self.comment_count > 0
    }

    /// Whether any label has exactly this name
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.name == name)
    }
}

/// Immutable, cheaply clonable sequence of messages in remote order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot(Arc<Vec<Message>>);

impl Snapshot {
    /// Build a snapshot, keeping the first occurrence of any duplicated id
    pub fn new(messages: Vec<Message>) -> Self {
        let mut seen = HashSet::with_capacity(messages.len());
        let unique: Vec<Message> = messages
            .into_iter()
            .filter(|m| seen.insert(m.id))
            .collect();
        Self(Arc::new(unique))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    pub fn ids(&self) -> Vec<u64> {
        self.0.iter().map(|m| m.id).collect()
    }

    pub fn get(&self, id: u64) -> Option<&Message> {
        self.0.iter().find(|m| m.id == id)
    }

    /// Number of messages flagged as new
    pub fn new_count(&self) -> usize {
        self.0.iter().filter(|m| m.is_new).count()
    }

    /// Whether two snapshots share the same backing storage
    pub fn ptr_eq(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Snapshot {
    type Target = [Message];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<Message> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Serialize for Snapshot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.as_slice().serialize(serializer)
    }
}
