//! Error types for mergebot

use thiserror::Error;

/// Errors produced while discovering, updating or merging pull requests
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or incomplete configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A merge method that is not one of merge, squash, rebase or ff
    #[error("unknown merge method: {0}")]
    UnknownMergeMethod(String),

    /// The repository requires a milestone and the PR has none
    #[error("the milestone is missing")]
    MissingMilestone,

    /// The review gate failed
    #[error("error related to reviews: {0}")]
    Reviews(String),

    /// Fast-forward was requested on a branch that is behind its base
    #[error("the use of the merge method [{0}] is impossible when a branch is not up-to-date")]
    StaleFastForward(String),

    /// The fork owner does not allow maintainers to push to the head branch
    #[error("the contributor doesn't allow maintainer modification (GitHub option)")]
    MaintainerEditsDisabled,

    /// CI reported a failing check
    #[error("checks failed: {0}")]
    ChecksFailed(String),

    /// The PR cannot be merged in its current state (conflicts or unknown)
    #[error("conflicts must be resolved in the PR")]
    NotMergeable,

    /// The retry budget for the PR is spent
    #[error("too many retries [{attempt}/{max}]: {cause}")]
    TooManyRetries {
        /// Attempt counter read from the retry label
        attempt: u32,
        /// Configured maximum
        max: u32,
        /// Failure that triggered the last retry
        cause: String,
    },

    /// The merge call returned without merging
    #[error("failed to merge PR: {0}")]
    MergeRejected(String),

    /// The update (rebase + push) failed
    #[error("failed to update: {0}")]
    UpdateFailed(String),

    /// A git command failed
    #[error("git error: {0}")]
    Git(String),

    /// The ephemeral workspace could not be prepared
    #[error("workspace error: {0}")]
    Workspace(String),

    /// GitHub API error
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// Generic forge error
    #[error("platform error: {0}")]
    Platform(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<octocrab::Error> for Error {
    fn from(err: octocrab::Error) -> Self {
        Self::GitHubApi(err.to_string())
    }
}

/// Result type alias for mergebot operations
pub type Result<T> = std::result::Result<T, Error>;
