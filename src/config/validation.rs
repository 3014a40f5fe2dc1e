//! Configuration validation
//!
//! Validates IssueChat configuration for correctness:
//! - Repository is a well-formed `owner/name`
//! - Sync interval is positive
//! - Label names are not empty
//! - API URL is http(s)

use super::chat_config::ChatConfig;
use super::repository::split_slug;
use crate::IssueChatError;

/// Validation error details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate an IssueChat configuration, reporting every problem found
pub fn validate_config(config: &ChatConfig) -> ValidationResult {
    let mut errors = Vec::new();

    match config.repository.as_deref() {
        None => errors.push(ValidationError::new(
            "repository",
            "A repository must be configured",
        )),
        Some(slug) if split_slug(slug).is_none() => errors.push(ValidationError::new(
            "repository",
            format!("Invalid repository '{}'. Expected owner/name", slug),
        )),
        Some(_) => {}
    }

    if config.sync_interval_seconds == 0 {
        errors.push(ValidationError::new(
            "sync_interval_seconds",
            "Sync interval must be greater than 0",
        ));
    }

    let labels = [
        ("labels.chat", &config.labels.chat),
        ("labels.urgent", &config.labels.urgent),
        ("labels.discussion", &config.labels.discussion),
    ];
    for (field, value) in labels {
        if value.trim().is_empty() {
            errors.push(ValidationError::new(field, "Label name cannot be empty"));
        }
    }

    if !config.api_url.starts_with("http://") && !config.api_url.starts_with("https://") {
        errors.push(ValidationError::new(
            "api_url",
            format!("Invalid API URL: {}", config.api_url),
        ));
    }

    if config.resolved_api_key().is_none() {
        tracing::warn!(
            "No API key configured and GITHUB_TOKEN is not set (only public repositories are readable)"
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate configuration and return a Result
pub fn validate_config_result(config: &ChatConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        IssueChatError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}
