//! Aggregate statistics over a snapshot

use crate::chat::Snapshot;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Per-author totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub message_count: usize,
    /// Newest message by this author
    pub last_message: DateTime<Utc>,
    pub avatar: String,
}

/// An author seen recently
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveUser {
    pub name: String,
    pub avatar: String,
    pub last_seen: DateTime<Utc>,
}

/// Live summary shown next to the connection indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySummary {
    pub total_messages: usize,
    pub unique_authors: usize,
    pub new_messages: usize,
    pub last_hour: usize,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageStats {
    pub total: usize,
    pub with_comments: usize,
    pub unique_authors: usize,
    /// Share of messages with at least one comment, as a rounded percentage
    pub response_rate: u32,
}

/// Message count, latest message and avatar per author, keyed by login
pub fn user_stats(snapshot: &Snapshot) -> BTreeMap<String, UserStats> {
    let mut stats: BTreeMap<String, UserStats> = BTreeMap::new();

    for message in snapshot.iter() {
        let entry = stats
            .entry(message.author.clone())
            .or_insert_with(|| UserStats {
                message_count: 0,
                last_message: message.created_at,
                avatar: message.author_avatar.clone(),
            });

        entry.message_count += 1;
        if message.created_at > entry.last_message {
            entry.last_message = message.created_at;
        }
    }

    stats
}

/// Authors with a message created after `now - window`, most recent first
pub fn active_users(snapshot: &Snapshot, now: DateTime<Utc>, window: Duration) -> Vec<ActiveUser> {
    let cutoff = now - window;
    let mut users: BTreeMap<&str, ActiveUser> = BTreeMap::new();

    for message in snapshot.iter().filter(|m| m.created_at > cutoff) {
        users
            .entry(message.author.as_str())
            .and_modify(|user| {
                if message.created_at > user.last_seen {
                    user.last_seen = message.created_at;
                }
            })
            .or_insert_with(|| ActiveUser {
                name: message.author.clone(),
                avatar: message.author_avatar.clone(),
                last_seen: message.created_at,
            });
    }

    let mut users: Vec<ActiveUser> = users.into_values().collect();
    users.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
    users
}

pub fn activity_summary(snapshot: &Snapshot, now: DateTime<Utc>) -> ActivitySummary {
    let hour_ago = now - Duration::hours(1);

    ActivitySummary {
        total_messages: snapshot.len(),
        unique_authors: unique_authors(snapshot),
        new_messages: snapshot.new_count(),
        last_hour: snapshot.iter().filter(|m| m.created_at > hour_ago).count(),
        last_activity: snapshot.iter().map(|m| m.created_at).max(),
    }
}

pub fn message_stats(snapshot: &Snapshot) -> MessageStats {
    let total = snapshot.len();
    let with_comments = snapshot.iter().filter(|m| m.has_comments()).count();
    let response_rate = if total > 0 {
        ((with_comments as f64 / total as f64) * 100.0).round() as u32
    } else {
        0
    };

    MessageStats {
        total,
        with_comments,
        unique_authors: unique_authors(snapshot),
        response_rate,
    }
}

/// Sorted, deduplicated author logins
pub fn available_authors(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .iter()
        .map(|m| m.author.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted, deduplicated label names
pub fn available_tags(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .iter()
        .flat_map(|m| m.labels.iter().map(|l| l.name.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn unique_authors(snapshot: &Snapshot) -> usize {
    snapshot
        .iter()
        .map(|m| m.author.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}
