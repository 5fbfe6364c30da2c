//! Ephemeral local clones of pull request branches
//!
//! Every operation clones into a fresh temporary directory which is removed
//! when the operation returns, whatever the outcome.

mod git;
mod remotes;

pub use git::{DEFAULT_GIT_TIMEOUT, GitWorkspace};
pub use remotes::{Remote, RemoteLayout, is_protected_branch, remote_url};

use crate::error::Result;
use crate::types::PullRequestDetails;
use async_trait::async_trait;

/// Remote holding the branch that is pushed
pub const REMOTE_ORIGIN: &str = "origin";

/// Second remote, present when the PR comes from a fork
pub const REMOTE_UPSTREAM: &str = "upstream";

/// Local version-control capability used by the engine and the merge executor
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Rebase the head branch onto the latest base and force-push it
    async fn update(&self, pr: &PullRequestDetails) -> Result<()>;

    /// Fast-forward the base branch to the head and push it
    ///
    /// Fails without touching the remote when a fast-forward is impossible.
    async fn fast_forward(&self, pr: &PullRequestDetails) -> Result<()>;
}
