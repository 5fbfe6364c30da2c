//! Core types for mergebot

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A repository as seen from one side of a pull request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryRef {
    /// Owner login (user or organization)
    pub owner: String,
    /// Repository name
    pub name: String,
    /// HTTPS clone URL
    pub clone_url: String,
    /// SSH clone URL
    pub ssh_url: String,
    /// Whether the repository is private
    pub private: bool,
    /// Whether the repository is itself a fork
    pub fork: bool,
}

impl RepositoryRef {
    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Head or base side of a pull request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchRef {
    /// Branch name
    pub ref_name: String,
    /// Commit the branch points to
    pub sha: String,
    /// Login of the branch owner
    pub user: String,
    /// Repository holding the branch
    pub repo: RepositoryRef,
}

/// Full pull request snapshot, re-read from the forge on every cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestDetails {
    /// PR number
    pub number: u64,
    /// PR title (used as merge commit title)
    pub title: String,
    /// Web URL for the PR
    pub html_url: String,
    /// Whether the PR was merged
    pub merged: bool,
    /// Whether PR can be merged (no conflicts)
    /// - `Some(true)` = mergeable
    /// - `Some(false)` = has conflicts
    /// - `None` = unknown (GitHub still computing)
    pub mergeable: Option<bool>,
    /// Whether the contributor lets maintainers push to the head branch
    pub maintainer_can_modify: bool,
    /// Whether a milestone is set
    pub has_milestone: bool,
    /// Label names currently on the PR
    pub labels: Vec<String>,
    /// Head (contributor) side
    pub head: BranchRef,
    /// Base (target) side
    pub base: BranchRef,
}

impl PullRequestDetails {
    /// Whether the head branch lives in the base repository (not a fork)
    pub fn is_on_main_repository(&self) -> bool {
        self.head.repo.full_name() == self.base.repo.full_name()
    }

    /// Whether the PR carries the given label
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// State of a single review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewState {
    /// Approved the changes
    Approved,
    /// Requested changes
    ChangesRequested,
    /// Comment only, no verdict
    Commented,
    /// A previous review was dismissed
    Dismissed,
    /// Review not submitted yet
    Pending,
    /// Anything GitHub adds later
    Other(String),
}

impl From<&str> for ReviewState {
    fn from(raw: &str) -> Self {
        match raw {
            "APPROVED" => Self::Approved,
            "CHANGES_REQUESTED" => Self::ChangesRequested,
            "COMMENTED" => Self::Commented,
            "DISMISSED" => Self::Dismissed,
            "PENDING" => Self::Pending,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for ReviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approved => write!(f, "APPROVED"),
            Self::ChangesRequested => write!(f, "CHANGES_REQUESTED"),
            Self::Commented => write!(f, "COMMENTED"),
            Self::Dismissed => write!(f, "DISMISSED"),
            Self::Pending => write!(f, "PENDING"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// A submitted review, in submission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Reviewer login
    pub reviewer: String,
    /// Review verdict
    pub state: ReviewState,
}

/// Aggregated or individual CI state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckState {
    /// Still running or queued
    Pending,
    /// Concluded successfully
    Success,
    /// Concluded with a failure or error
    Failure,
}

impl std::fmt::Display for CheckState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// One commit status or check run, normalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    /// Status context or check run name
    pub name: String,
    /// Normalized state
    pub state: CheckState,
}

impl Check {
    /// Create a check
    pub fn new(name: impl Into<String>, state: CheckState) -> Self {
        Self {
            name: name.into(),
            state,
        }
    }
}

/// Repository metadata needed by the maintainer-modification gate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    /// Whether the repository is private
    pub private: bool,
    /// Whether the repository is a fork
    pub fork: bool,
}

/// Result of a merge operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// Whether the merge was successful
    pub merged: bool,
    /// Message from the merge operation (especially on failure)
    pub message: String,
}

impl MergeResult {
    /// Successful merge with a message
    pub fn merged(message: impl Into<String>) -> Self {
        Self {
            merged: true,
            message: message.into(),
        }
    }
}

/// Merge strategy/method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MergeMethod {
    /// Create a merge commit
    Merge,
    /// Squash all commits into one
    Squash,
    /// Rebase commits onto base branch
    Rebase,
    /// Local fast-forward of the base branch, then push
    FastForward,
}

impl MergeMethod {
    /// Every supported method, used to build the label cleanup set
    pub const ALL: [Self; 4] = [Self::Squash, Self::Merge, Self::Rebase, Self::FastForward];

    /// Short name used in configuration and labels
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Squash => "squash",
            Self::Rebase => "rebase",
            Self::FastForward => "ff",
        }
    }
}

impl std::fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MergeMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(Self::Merge),
            "squash" => Ok(Self::Squash),
            "rebase" => Ok(Self::Rebase),
            "ff" => Ok(Self::FastForward),
            other => Err(Error::UnknownMergeMethod(other.to_string())),
        }
    }
}

impl TryFrom<String> for MergeMethod {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MergeMethod> for String {
    fn from(method: MergeMethod) -> Self {
        method.as_str().to_string()
    }
}

/// An open PR returned by the issue search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueHit {
    /// `owner/name` of the repository
    pub repository: String,
    /// PR number
    pub number: u64,
    /// Last update time
    pub updated_at: DateTime<Utc>,
    /// Label names
    pub labels: Vec<String>,
}
