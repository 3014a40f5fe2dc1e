//! Search and filter over a snapshot

use crate::chat::{Message, Snapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tri-state comment criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HasComments {
    /// No constraint
    #[default]
    Unset,
    True,
    False,
}

impl HasComments {
    fn matches(&self, message: &Message) -> bool {
        match self {
            HasComments::Unset => true,
            HasComments::True => message.has_comments(),
            HasComments::False => !message.has_comments(),
        }
    }
}

impl From<Option<bool>> for HasComments {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => HasComments::Unset,
            Some(true) => HasComments::True,
            Some(false) => HasComments::False,
        }
    }
}

/// Inclusive bounds on `created_at`. Either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| at >= start) && self.end.is_none_or(|end| at <= end)
    }
}

/// Filter criteria; every set criterion must match
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Exact, case-sensitive author login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Any of these, matched case-insensitively as substrings of label names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub has_comments: HasComments,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn has_comments(mut self, has_comments: HasComments) -> Self {
        self.has_comments = has_comments;
        self
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// True when no criterion is set
    pub fn is_empty(&self) -> bool {
        self.author.as_deref().is_none_or(str::is_empty)
            && self.tags.is_empty()
            && self.has_comments == HasComments::Unset
            && self.date_range.is_none()
    }

    pub fn matches(&self, message: &Message) -> bool {
        if let Some(author) = self.author.as_deref().filter(|a| !a.is_empty()) {
            if message.author != author {
                return false;
            }
        }

        if !self.tags.is_empty() && !matches_any_tag(message, &self.tags) {
            return false;
        }

        if !self.has_comments.matches(message) {
            return false;
        }

        self.date_range
            .is_none_or(|range| range.contains(message.created_at))
    }
}

fn matches_any_tag(message: &Message, tags: &[String]) -> bool {
    let names: Vec<String> = message.labels.iter().map(|l| l.name.to_lowercase()).collect();
    tags.iter()
        .map(|tag| tag.to_lowercase())
        .any(|tag| names.iter().any(|name| name.contains(&tag)))
}

/// Case-insensitive substring search over title, body and author.
///
/// A blank query returns the input unchanged.
pub fn search(snapshot: &Snapshot, query: &str) -> Snapshot {
    let query = query.trim();
    if query.is_empty() {
        return snapshot.clone();
    }

    let needle = query.to_lowercase();
    snapshot
        .iter()
        .filter(|m| {
            m.title.to_lowercase().contains(&needle)
                || m.body.to_lowercase().contains(&needle)
                || m.author.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Keep the messages matching every set criterion of `spec`
pub fn filter(snapshot: &Snapshot, spec: &FilterSpec) -> Snapshot {
    if spec.is_empty() {
        return snapshot.clone();
    }

    snapshot
        .iter()
        .filter(|m| spec.matches(m))
        .cloned()
        .collect()
}
