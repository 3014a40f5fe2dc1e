//! Issue transport abstraction
//!
//! Defines the trait the sync core consumes to talk to a remote issue tracker,
//! together with the record types exchanged across it. The transport is a thin,
//! stateless request/response wrapper: it knows nothing about snapshots,
//! single-flight execution or reconnection.
//!
//! # Built-in Transports
//!
//! - **GitHub**: REST API adapter for GitHub Issues ([`GitHubTransport`])

pub mod github;
#[cfg(test)]
pub(crate) mod mock;

pub use github::GitHubTransport;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("GitHub API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether the remote rejected our credentials
    pub fn is_auth(&self) -> bool {
        matches!(self, TransportError::Unauthorized(_))
    }

    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Network(_) => "network",
            TransportError::Unauthorized(_) => "auth",
            TransportError::NotFound(_) => "not_found",
            TransportError::RateLimited => "rate_limited",
            TransportError::Api { .. } => "api",
            TransportError::Decode(_) => "decode",
        }
    }
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Author of a remote record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAuthor {
    pub name: String,
    pub avatar_ref: String,
}

/// Label attached to a remote record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLabel {
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An issue as returned by the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub author: RecordAuthor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comment_count: u32,
    #[serde(default)]
    pub labels: Vec<RecordLabel>,
}

/// Issue state filter for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IssueState {
    #[default]
    Open,
    Closed,
    All,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
            IssueState::All => "all",
        }
    }
}

/// Server-side sort key for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListSort {
    #[default]
    Created,
    Updated,
    Comments,
}

impl ListSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListSort::Created => "created",
            ListSort::Updated => "updated",
            ListSort::Comments => "comments",
        }
    }
}

/// Server-side sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Options for `list_items`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub state: IssueState,
    pub page_size: u32,
    pub sort: ListSort,
    pub order: SortOrder,
}

/// Page size used by a sync cycle
pub const DEFAULT_PAGE_SIZE: u32 = 50;

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            state: IssueState::Open,
            page_size: DEFAULT_PAGE_SIZE,
            sort: ListSort::Created,
            order: SortOrder::Desc,
        }
    }
}

/// Issue creation payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewItem {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// Outcome of an access probe against a repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessReport {
    pub accessible: bool,
    pub can_read: bool,
    pub can_write: bool,
    pub error: Option<String>,
}

impl AccessReport {
    /// A report for a repository that could not be reached at all
    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Whether the repository can be both read and written
    pub fn is_usable(&self) -> bool {
        self.accessible && self.can_read && self.can_write
    }
}

/// Trait for issue tracker backends
#[async_trait]
pub trait IssueTransport: Send + Sync {
    /// List issues in a repository
    async fn list_items(
        &self,
        owner: &str,
        repo: &str,
        options: &ListOptions,
    ) -> Result<Vec<IssueRecord>>;

    /// Create a new issue
    async fn create_item(&self, owner: &str, repo: &str, item: &NewItem) -> Result<IssueRecord>;

    /// Probe read/write access. Never fails; problems are reported in the report.
    async fn validate_access(&self, owner: &str, repo: &str) -> AccessReport;

    /// Replace the credentials used for subsequent requests
    fn set_api_key(&self, api_key: Option<String>);
}
