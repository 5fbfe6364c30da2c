//! Forge services
//!
//! Provides the repository-scoped interface the reconciliation engine uses
//! to read pull requests and write labels, comments and merges.

mod github;

pub use github::{DEFAULT_TIMEOUT, GitHubConnection, GitHubService};

use crate::error::Result;
use crate::types::{
    Check, MergeMethod, MergeResult, PullRequestDetails, RepositoryInfo, Review,
};
use async_trait::async_trait;

/// Repository a service is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
}

impl PlatformConfig {
    /// Split `owner/name`
    pub fn from_full_name(full_name: &str) -> Option<Self> {
        let (owner, repo) = full_name.split_once('/')?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Platform service trait for one repository
///
/// Every call is a bounded round-trip; nothing is cached between calls so
/// each reconciliation sees the forge's current state.
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// Get the platform configuration
    fn config(&self) -> &PlatformConfig;

    /// Get the full PR snapshot
    async fn get_pr_details(&self, pr_number: u64) -> Result<PullRequestDetails>;

    /// List submitted reviews in submission order
    async fn list_reviews(&self, pr_number: u64) -> Result<Vec<Review>>;

    /// List commit statuses and check runs for a commit
    async fn list_checks(&self, sha: &str) -> Result<Vec<Check>>;

    /// Whether branch protection on `branch` requires up-to-date branches
    ///
    /// An unprotected branch is not strict.
    async fn is_strict_branch(&self, branch: &str) -> Result<bool>;

    /// Private/fork flags of the repository
    async fn get_repository_info(&self) -> Result<RepositoryInfo>;

    /// Whether the head branch contains the tip of the base branch
    async fn is_up_to_date(&self, pr: &PullRequestDetails) -> Result<bool>;

    /// Add labels to a PR
    async fn add_labels(&self, pr_number: u64, labels: &[String]) -> Result<()>;

    /// Remove a label from a PR
    async fn remove_label(&self, pr_number: u64, label: &str) -> Result<()>;

    /// Create a comment on a PR
    async fn create_pr_comment(&self, pr_number: u64, body: &str) -> Result<()>;

    /// Merge a PR through the forge
    ///
    /// `title` becomes the commit title. Fast-forward is not a forge method.
    async fn merge_pr(&self, pr_number: u64, method: MergeMethod, title: &str)
    -> Result<MergeResult>;
}
