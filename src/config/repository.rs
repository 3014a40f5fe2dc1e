//! Remote repository identity and label taxonomy

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label names used to classify chat messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTaxonomy {
    /// Label attached to every message sent from this client
    #[serde(default = "default_chat_label")]
    pub chat: String,

    #[serde(default = "default_urgent_label")]
    pub urgent: String,

    #[serde(default = "default_discussion_label")]
    pub discussion: String,
}

fn default_chat_label() -> String {
    "chat".to_string()
}

fn default_urgent_label() -> String {
    "urgent".to_string()
}

fn default_discussion_label() -> String {
    "discussion".to_string()
}

impl Default for LabelTaxonomy {
    fn default() -> Self {
        Self {
            chat: default_chat_label(),
            urgent: default_urgent_label(),
            discussion: default_discussion_label(),
        }
    }
}

/// Which remote collection to sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub owner: String,
    pub name: String,
    pub labels: LabelTaxonomy,
}

impl RepositoryConfig {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            labels: LabelTaxonomy::default(),
        }
    }

    /// Parse an `owner/name` slug
    pub fn parse(slug: &str) -> crate::Result<Self> {
        let (owner, name) = split_slug(slug).ok_or_else(|| {
            crate::IssueChatError::Config(format!(
                "Invalid repository '{}': expected owner/name",
                slug
            ))
        })?;
        Ok(Self::new(owner, name))
    }

    pub fn with_labels(mut self, labels: LabelTaxonomy) -> Self {
        self.labels = labels;
        self
    }

    /// `owner/name` form
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Split `owner/name` into its two non-empty parts
pub(crate) fn split_slug(slug: &str) -> Option<(&str, &str)> {
    let (owner, name) = slug.trim().split_once('/')?;
    let valid = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    if valid(owner) && valid(name) {
        Some((owner, name))
    } else {
        None
    }
}
