//! Configuration system
//!
//! Loads ~/.config/issuechat/config.yaml with support for:
//! - The `owner/name` repository backing the chat room
//! - Sync cadence and auto-sync toggle
//! - API key (falling back to `GITHUB_TOKEN`) and API endpoint
//! - Label taxonomy (chat, urgent, discussion)

mod chat_config;
mod repository;
pub mod validation;

pub use chat_config::{ChatConfig, TOKEN_ENV_VAR};
pub use repository::{LabelTaxonomy, RepositoryConfig};
pub use validation::{validate_config, validate_config_result, ValidationError};
