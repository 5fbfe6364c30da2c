//! Bot configuration
//!
//! Global settings plus one [`RepoConfig`] policy per repository, with a
//! default policy for repositories that have no entry of their own.

mod storage;

pub use storage::{DEFAULT_CONFIG_FILE, load_config, parse_config};

use crate::labels::Markers;
use crate::types::MergeMethod;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// GitHub access
    pub github: GitHubConfig,
    /// Local git settings for the ephemeral clones
    pub git: GitConfig,
    /// Server mode settings
    pub server: ServerConfig,
    /// Label markers
    pub markers: Markers,
    /// Retry policy
    pub retry: RetryConfig,
    /// Runtime switches
    pub extra: Extra,
    /// Policy for repositories without their own entry
    pub default: RepoConfig,
    /// Per-repository policies keyed by `owner/name`
    pub repositories: HashMap<String, RepoConfig>,
}

impl Configuration {
    /// Policy for a repository, falling back to the default
    pub fn repo_config(&self, full_name: &str) -> &RepoConfig {
        self.repositories.get(full_name).unwrap_or(&self.default)
    }
}

/// GitHub access settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// User or organization whose PRs are searched
    pub user: String,
    /// API token; `GITHUB_TOKEN` is used when empty
    pub token: String,
    /// API base URL for GitHub Enterprise
    pub url: Option<String>,
    /// Deadline of one API request, in seconds
    pub timeout_secs: Option<u64>,
}

/// Git identity and transport
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// `user.name` inside clones
    pub user_name: Option<String>,
    /// `user.email` inside clones
    pub user_email: Option<String>,
    /// Clone over SSH instead of token HTTPS
    pub ssh: bool,
    /// Deadline of one git command, in seconds
    pub timeout_secs: Option<u64>,
}

/// Server mode settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 80 }
    }
}

/// Retry policy shared by all repositories
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts; zero or less escalates on the first failure
    pub number: i32,
    /// Retry when the PR is not mergeable
    pub on_mergeable: bool,
    /// Retry when CI statuses cannot be read or fail
    pub on_statuses: bool,
}

impl RetryConfig {
    /// Whether any retry policy is enabled
    pub const fn any_enabled(&self) -> bool {
        self.on_mergeable || self.on_statuses
    }
}

/// Runtime switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Extra {
    /// Never write to GitHub or push
    pub dry_run: bool,
    /// Debug logging
    pub debug: bool,
    /// Log level when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Extra {
    fn default() -> Self {
        Self {
            dry_run: true,
            debug: false,
            log_level: "info".to_string(),
        }
    }
}

/// How the up-to-date requirement is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpToDateMode {
    /// Never require the branch to be up to date
    Off,
    /// Follow the base branch protection's "strict" flag
    UseBranchProtection,
    /// Always require the branch to be up to date
    Forced,
}

/// Per-repository policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Approvals required
    pub min_review: u32,
    /// Approvals required when the light-review label is present
    pub min_light_review: u32,
    /// Require a milestone before merging
    pub need_milestone: bool,
    /// Read the up-to-date requirement from branch protection
    pub check_need_up_to_date: bool,
    /// Always require the branch to be up to date
    pub force_need_up_to_date: bool,
    /// Merge method when no override label is set
    pub merge_method: MergeMethod,
    /// Post escalation reasons as PR comments
    pub add_error_in_comment: bool,
    /// Post escalation reasons on private repositories even when comments are off
    pub comment_on_private: bool,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            min_review: 1,
            min_light_review: 0,
            need_milestone: false,
            check_need_up_to_date: false,
            force_need_up_to_date: true,
            merge_method: MergeMethod::Squash,
            add_error_in_comment: false,
            comment_on_private: false,
        }
    }
}

impl RepoConfig {
    /// Resolved up-to-date mode; branch protection wins over forcing
    pub const fn up_to_date_mode(&self) -> UpToDateMode {
        if self.check_need_up_to_date {
            UpToDateMode::UseBranchProtection
        } else if self.force_need_up_to_date {
            UpToDateMode::Forced
        } else {
            UpToDateMode::Off
        }
    }

    /// Whether an escalation on this repository gets a comment
    pub const fn should_comment(&self, private_repository: bool) -> bool {
        self.add_error_in_comment || (private_repository && self.comment_on_private)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_up_to_date_mode_prefers_branch_protection() {
        let config = RepoConfig {
            check_need_up_to_date: true,
            force_need_up_to_date: true,
            ..RepoConfig::default()
        };
        assert_eq!(config.up_to_date_mode(), UpToDateMode::UseBranchProtection);

        let config = RepoConfig {
            force_need_up_to_date: false,
            ..RepoConfig::default()
        };
        assert_eq!(config.up_to_date_mode(), UpToDateMode::Off);
    }

    #[test]
    fn test_comment_policy() {
        let config = RepoConfig::default();
        assert!(!config.should_comment(false));
        assert!(!config.should_comment(true));

        let config = RepoConfig {
            comment_on_private: true,
            ..RepoConfig::default()
        };
        assert!(!config.should_comment(false));
        assert!(config.should_comment(true));

        let config = RepoConfig {
            add_error_in_comment: true,
            ..RepoConfig::default()
        };
        assert!(config.should_comment(false));
    }

    #[test]
    fn test_repo_config_falls_back_to_default() {
        let mut config = Configuration::default();
        config.repositories.insert(
            "acme/widgets".to_string(),
            RepoConfig {
                min_review: 3,
                ..RepoConfig::default()
            },
        );
        assert_eq!(config.repo_config("acme/widgets").min_review, 3);
        assert_eq!(config.repo_config("acme/other").min_review, 1);
    }
}
