//! Remote layout of a clone, depending on fork vs. same-repository PRs.

use super::{REMOTE_ORIGIN, REMOTE_UPSTREAM};
use crate::types::{PullRequestDetails, RepositoryRef};
use url::Url;

/// Branches that are never rebased
const PROTECTED_BRANCHES: [&str; 2] = ["master", "main"];

/// Whether a branch must never be rebased or force-pushed
pub fn is_protected_branch(name: &str) -> bool {
    PROTECTED_BRANCHES.contains(&name)
}

/// A configured remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    /// Remote name
    pub name: &'static str,
    /// Fetch/push URL
    pub url: String,
}

/// Remotes of a clone and the branches involved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    /// Cloned repository; the pushed branch lives here
    pub origin: Remote,
    /// Other side of a fork PR
    pub upstream: Option<Remote>,
    /// Branch checked out by the clone
    pub checkout: String,
    /// Branch fetched from the other side
    pub other_branch: String,
}

impl RemoteLayout {
    /// Layout for updating the head branch
    ///
    /// `origin` is the contributor's repository and `upstream` the base
    /// repository when they differ.
    pub fn for_update(pr: &PullRequestDetails, token: &str, ssh: bool) -> Self {
        let upstream = (!pr.is_on_main_repository()).then(|| Remote {
            name: REMOTE_UPSTREAM,
            url: remote_url(&pr.base.repo, token, ssh),
        });
        Self {
            origin: Remote {
                name: REMOTE_ORIGIN,
                url: remote_url(&pr.head.repo, token, ssh),
            },
            upstream,
            checkout: pr.head.ref_name.clone(),
            other_branch: pr.base.ref_name.clone(),
        }
    }

    /// Layout for fast-forwarding the base branch
    ///
    /// `origin` is the base repository and `upstream` the contributor's fork.
    pub fn for_fast_forward(pr: &PullRequestDetails, token: &str, ssh: bool) -> Self {
        let upstream = (!pr.is_on_main_repository()).then(|| Remote {
            name: REMOTE_UPSTREAM,
            url: remote_url(&pr.head.repo, token, ssh),
        });
        Self {
            origin: Remote {
                name: REMOTE_ORIGIN,
                url: remote_url(&pr.base.repo, token, ssh),
            },
            upstream,
            checkout: pr.base.ref_name.clone(),
            other_branch: pr.head.ref_name.clone(),
        }
    }

    /// Remote the other branch is fetched from
    pub fn other_remote(&self) -> &'static str {
        self.upstream.as_ref().map_or(self.origin.name, |r| r.name)
    }

    /// `<remote>/<branch>` of the other side
    pub fn other_ref(&self) -> String {
        format!("{}/{}", self.other_remote(), self.other_branch)
    }
}

/// Clone URL for a repository, with the token as HTTPS credentials
pub fn remote_url(repo: &RepositoryRef, token: &str, ssh: bool) -> String {
    if ssh {
        if !repo.ssh_url.is_empty() {
            return repo.ssh_url.clone();
        }
        return format!("git@github.com:{}.git", repo.full_name());
    }

    let https = if repo.clone_url.is_empty() {
        format!("https://github.com/{}.git", repo.full_name())
    } else {
        repo.clone_url.clone()
    };

    if token.is_empty() {
        return https;
    }

    let Ok(mut url) = Url::parse(&https) else {
        return https;
    };
    if url.set_username(token).is_ok() {
        url.to_string()
    } else {
        https
    }
}
