//! Snapshot ordering

use crate::chat::{Message, Snapshot};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sort order for a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Descending `created_at`
    #[default]
    Newest,
    /// Ascending `created_at`
    Oldest,
    /// Descending comment count
    Popular,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Newest => "newest",
            SortMode::Oldest => "oldest",
            SortMode::Popular => "popular",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "newest" => Ok(SortMode::Newest),
            "oldest" => Ok(SortMode::Oldest),
            "popular" => Ok(SortMode::Popular),
            other => Err(format!(
                "Unknown sort mode '{}' (expected newest, oldest or popular)",
                other
            )),
        }
    }
}

/// Sort a snapshot. Ties keep their relative input order.
pub fn sort(snapshot: &Snapshot, mode: SortMode) -> Snapshot {
    let mut messages: Vec<Message> = snapshot.to_vec();

    // `sort_by` is stable.
    match mode {
        SortMode::Newest => messages.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortMode::Oldest => messages.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortMode::Popular => messages.sort_by(|a, b| b.comment_count.cmp(&a.comment_count)),
    }

    Snapshot::new(messages)
}
