//! Shared test fixtures

#![allow(dead_code)]

mod mock_platform;
mod mock_workspace;

pub use mock_platform::*;
pub use mock_workspace::*;

use chrono::{TimeZone, Utc};
use mergebot::cycle::RepositoryProvider;
use mergebot::platform::{PlatformConfig, PlatformService};
use mergebot::types::{
    BranchRef, Check, CheckState, IssueHit, PullRequestDetails, RepositoryRef, Review,
    ReviewState,
};
use std::collections::HashMap;

pub const TOKEN: &str = "s3cret-token";

/// Config for the `acme/widgets` test repository
pub fn github_config() -> PlatformConfig {
    PlatformConfig {
        owner: "acme".to_string(),
        repo: "widgets".to_string(),
    }
}

/// Repository reference owned by `owner`
pub fn repository(owner: &str) -> RepositoryRef {
    RepositoryRef {
        owner: owner.to_string(),
        name: "widgets".to_string(),
        clone_url: format!("https://github.com/{owner}/widgets.git"),
        ssh_url: format!("git@github.com:{owner}/widgets.git"),
        private: false,
        fork: false,
    }
}

/// Open, mergeable same-repository PR on `acme/widgets`
pub fn make_pr(number: u64, labels: &[&str]) -> PullRequestDetails {
    PullRequestDetails {
        number,
        title: format!("Feature {number}"),
        html_url: format!("https://github.com/acme/widgets/pull/{number}"),
        merged: false,
        mergeable: Some(true),
        maintainer_can_modify: true,
        has_milestone: false,
        labels: labels.iter().map(ToString::to_string).collect(),
        head: BranchRef {
            ref_name: format!("feature-{number}"),
            sha: format!("head-{number}"),
            user: "acme".to_string(),
            repo: repository("acme"),
        },
        base: BranchRef {
            ref_name: "main".to_string(),
            sha: "base".to_string(),
            user: "acme".to_string(),
            repo: repository("acme"),
        },
    }
}

/// Same as [`make_pr`] but opened from `alice`'s fork
pub fn make_fork_pr(number: u64, labels: &[&str]) -> PullRequestDetails {
    let mut pr = make_pr(number, labels);
    pr.head.user = "alice".to_string();
    pr.head.repo = repository("alice");
    pr
}

/// An approving review
pub fn approval(reviewer: &str) -> Review {
    Review {
        reviewer: reviewer.to_string(),
        state: ReviewState::Approved,
    }
}

/// Mock holding a PR that passes every gate: one approval, green CI
pub fn mock_with_ready_pr(pr: PullRequestDetails) -> MockPlatformService {
    let mock = MockPlatformService::with_config(github_config());
    mock.set_reviews(pr.number, vec![approval("bob")]);
    mock.set_checks(&pr.head.sha, vec![Check::new("ci", CheckState::Success)]);
    mock.add_pr(pr);
    mock
}

/// Search hit updated `minute` minutes after a fixed origin
pub fn make_hit(repo: &str, number: u64, minute: u32, labels: &[&str]) -> IssueHit {
    IssueHit {
        repository: repo.to_string(),
        number,
        updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
        labels: labels.iter().map(ToString::to_string).collect(),
    }
}

/// Hands out clones of registered mocks by `owner/name`
#[derive(Default)]
pub struct MockRepositories {
    services: HashMap<String, MockPlatformService>,
}

impl MockRepositories {
    /// Register a mock for its repository
    pub fn insert(&mut self, mock: &MockPlatformService) {
        self.services
            .insert(mock.config().full_name(), mock.clone());
    }
}

impl RepositoryProvider for MockRepositories {
    fn repository(&self, config: &PlatformConfig) -> Box<dyn PlatformService> {
        let mock = self
            .services
            .get(&config.full_name())
            .cloned()
            .unwrap_or_else(|| MockPlatformService::with_config(config.clone()));
        Box::new(mock)
    }
}
