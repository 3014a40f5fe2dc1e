//! GitHub Issues transport
//!
//! Thin REST wrapper around the GitHub Issues API. Turns HTTP calls into
//! [`IssueRecord`]s and maps HTTP failures onto [`TransportError`].

use super::{
    AccessReport, IssueRecord, IssueTransport, ListOptions, NewItem, RecordAuthor, RecordLabel,
    Result, TransportError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Public GitHub REST endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Per-request timeout for listings (can return large result sets)
const LIST_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-request timeout for single resource fetches
const GET_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout for create operations
const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// GitHub REST client implementing [`IssueTransport`]
pub struct GitHubTransport {
    client: Client,
    base_url: String,
    api_key: RwLock<Option<String>>,
}

/// GitHub issue (REST API format)
#[derive(Debug, Clone, Deserialize)]
struct GitHubIssue {
    id: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    user: Option<GitHubUser>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    comments: u32,
    #[serde(default)]
    labels: Vec<GitHubLabel>,
    /// Present when the "issue" is actually a pull request
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct GitHubUser {
    login: String,
    #[serde(default)]
    avatar_url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GitHubLabel {
    name: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Repository metadata (only the fields we need)
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepository {
    pub full_name: String,
    #[serde(default)]
    pub permissions: Option<GitHubPermissions>,
}

/// Permissions of the authenticated user on a repository
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct GitHubPermissions {
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub push: bool,
    #[serde(default)]
    pub pull: bool,
}

impl From<GitHubIssue> for IssueRecord {
    fn from(issue: GitHubIssue) -> Self {
        let author = issue
            .user
            .map(|u| RecordAuthor {
                name: u.login,
                avatar_ref: u.avatar_url,
            })
            .unwrap_or_else(|| RecordAuthor {
                name: "ghost".to_string(),
                avatar_ref: String::new(),
            });

        IssueRecord {
            id: issue.id,
            title: issue.title,
            body: issue.body,
            author,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            comment_count: issue.comments,
            labels: issue
                .labels
                .into_iter()
                .map(|l| RecordLabel {
                    name: l.name,
                    color: l.color.unwrap_or_default(),
                    description: l.description,
                })
                .collect(),
        }
    }
}

impl GitHubTransport {
    /// Create a transport against the public GitHub API
    pub fn new() -> crate::Result<Self> {
        Self::with_base_url(DEFAULT_API_URL)
    }

    /// Create a transport against a custom REST endpoint (GitHub Enterprise, tests)
    pub fn with_base_url(base_url: impl Into<String>) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(
                    header::USER_AGENT,
                    header::HeaderValue::from_static("issuechat/0.3"),
                );
                headers.insert(
                    header::ACCEPT,
                    header::HeaderValue::from_static("application/vnd.github.v3+json"),
                );
                headers
            })
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: RwLock::new(None),
        })
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.set_api_key(Some(token.into()));
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_key().is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn current_key(&self) -> Option<String> {
        self.api_key.read().map(|k| k.clone()).unwrap_or(None)
    }

    fn repo_url(&self, owner: &str, repo: &str) -> String {
        format!(
            "{}/repos/{}/{}",
            self.base_url,
            urlencoding::encode(owner),
            urlencoding::encode(repo)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.current_key() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Map a non-success response onto a transport error
    async fn error_for(response: Response, what: &str) -> TransportError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status {
            StatusCode::UNAUTHORIZED => TransportError::Unauthorized(format!(
                "{}: GitHub rejected the credentials",
                what
            )),
            StatusCode::TOO_MANY_REQUESTS => TransportError::RateLimited,
            StatusCode::FORBIDDEN if body.to_lowercase().contains("rate limit") => {
                TransportError::RateLimited
            }
            StatusCode::FORBIDDEN => {
                TransportError::Unauthorized(format!("{}: access forbidden", what))
            }
            StatusCode::NOT_FOUND => TransportError::NotFound(what.to_string()),
            status => TransportError::Api {
                status: status.as_u16(),
                message: body,
            },
        }
    }

    /// Fetch repository metadata
    pub async fn get_repository(&self, owner: &str, repo: &str) -> Result<GitHubRepository> {
        let url = self.repo_url(owner, repo);
        debug!(owner = %owner, repo = %repo, "Fetching GitHub repository");

        let response = self
            .authorize(self.client.get(&url))
            .timeout(GET_TIMEOUT)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(Self::error_for(response, &format!("{}/{}", owner, repo)).await);
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
impl IssueTransport for GitHubTransport {
    async fn list_items(
        &self,
        owner: &str,
        repo: &str,
        options: &ListOptions,
    ) -> Result<Vec<IssueRecord>> {
        let url = format!("{}/issues", self.repo_url(owner, repo));
        let per_page = options.page_size.to_string();

        debug!(
            owner = %owner,
            repo = %repo,
            state = options.state.as_str(),
            per_page = options.page_size,
            "Listing GitHub issues"
        );

        let request = self.client.get(&url).query(&[
            ("state", options.state.as_str()),
            ("per_page", per_page.as_str()),
            ("sort", options.sort.as_str()),
            ("direction", options.order.as_str()),
        ]);

        let response = self.authorize(request).timeout(LIST_TIMEOUT).send().await?;

        if response.status() != StatusCode::OK {
            return Err(Self::error_for(response, &format!("{}/{} issues", owner, repo)).await);
        }

        let issues: Vec<GitHubIssue> = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        let total = issues.len();
        let records: Vec<IssueRecord> = issues
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(IssueRecord::from)
            .collect();

        debug!(
            returned = total,
            issues = records.len(),
            "GitHub issue listing complete"
        );

        Ok(records)
    }

    async fn create_item(&self, owner: &str, repo: &str, item: &NewItem) -> Result<IssueRecord> {
        let url = format!("{}/issues", self.repo_url(owner, repo));

        info!(owner = %owner, repo = %repo, title = %item.title, "Creating GitHub issue");

        let response = self
            .authorize(self.client.post(&url).json(item))
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => {
                let issue: GitHubIssue = response
                    .json()
                    .await
                    .map_err(|e| TransportError::Decode(e.to_string()))?;
                info!(id = issue.id, "GitHub issue created");
                Ok(issue.into())
            }
            _ => Err(Self::error_for(response, &format!("{}/{} create issue", owner, repo)).await),
        }
    }

    async fn validate_access(&self, owner: &str, repo: &str) -> AccessReport {
        let repository = match self.get_repository(owner, repo).await {
            Ok(r) => r,
            Err(e) => {
                warn!(owner = %owner, repo = %repo, error = %e, "Repository not accessible");
                return AccessReport::unreachable(e.to_string());
            }
        };

        let probe = ListOptions {
            page_size: 1,
            ..Default::default()
        };
        if let Err(e) = self.list_items(owner, repo, &probe).await {
            warn!(owner = %owner, repo = %repo, error = %e, "Issues not readable");
            return AccessReport {
                accessible: true,
                can_read: false,
                can_write: false,
                error: Some(e.to_string()),
            };
        }

        let can_write = repository.permissions.map(|p| p.push).unwrap_or(false);
        debug!(
            repository = %repository.full_name,
            can_write = can_write,
            "Access probe complete"
        );

        AccessReport {
            accessible: true,
            can_read: true,
            can_write,
            error: if can_write {
                None
            } else {
                Some("Cannot create issues in this repository".to_string())
            },
        }
    }

    fn set_api_key(&self, api_key: Option<String>) {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        match self.api_key.write() {
            Ok(mut guard) => *guard = api_key,
            Err(poisoned) => *poisoned.into_inner() = api_key,
        }
    }
}
