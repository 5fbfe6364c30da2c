//! Mock platform service for testing
//!
//! Keeps a live label set per PR so that consecutive `process` calls see the
//! effects of the previous ones, the way the forge would.

#![allow(dead_code)]

use async_trait::async_trait;
use mergebot::error::{Error, Result};
use mergebot::platform::{PlatformConfig, PlatformService};
use mergebot::types::{
    Check, MergeMethod, MergeResult, PullRequestDetails, RepositoryInfo, Review,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Call record for `add_labels`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddLabelsCall {
    pub pr_number: u64,
    pub labels: Vec<String>,
}

/// Call record for `remove_label`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveLabelCall {
    pub pr_number: u64,
    pub label: String,
}

/// Call record for `create_pr_comment`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCommentCall {
    pub pr_number: u64,
    pub body: String,
}

/// Call record for `merge_pr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePrCall {
    pub pr_number: u64,
    pub method: MergeMethod,
    pub title: String,
}

#[derive(Default)]
struct State {
    prs: HashMap<u64, PullRequestDetails>,
    reviews: HashMap<u64, Vec<Review>>,
    checks: HashMap<String, Vec<Check>>,
    strict: bool,
    repository: RepositoryInfo,
    up_to_date: bool,
    merge_response: Option<MergeResult>,
    // Call tracking
    get_pr_details_calls: Vec<u64>,
    add_labels_calls: Vec<AddLabelsCall>,
    remove_label_calls: Vec<RemoveLabelCall>,
    comment_calls: Vec<CreateCommentCall>,
    merge_pr_calls: Vec<MergePrCall>,
    strict_calls: Vec<String>,
    // Error injection
    error_on_get_pr: Option<String>,
    error_on_list_checks: Option<String>,
    error_on_strict: Option<String>,
    error_on_merge_pr: Option<String>,
    error_on_add_labels: Option<String>,
}

/// Hand-written `PlatformService` mock
///
/// Clones share state, so a clone handed to the code under test can be
/// inspected through the original.
#[derive(Clone)]
pub struct MockPlatformService {
    config: PlatformConfig,
    state: Arc<Mutex<State>>,
}

impl MockPlatformService {
    /// Create a new mock bound to a repository
    pub fn with_config(config: PlatformConfig) -> Self {
        let state = State {
            up_to_date: true,
            ..State::default()
        };
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    // === Setup ===

    /// Register a PR snapshot
    pub fn add_pr(&self, pr: PullRequestDetails) {
        self.state().prs.insert(pr.number, pr);
    }

    /// Set the reviews of a PR
    pub fn set_reviews(&self, pr_number: u64, reviews: Vec<Review>) {
        self.state().reviews.insert(pr_number, reviews);
    }

    /// Set the checks of a commit
    pub fn set_checks(&self, sha: &str, checks: Vec<Check>) {
        self.state().checks.insert(sha.to_string(), checks);
    }

    /// Set the branch protection strict flag
    pub fn set_strict(&self, strict: bool) {
        self.state().strict = strict;
    }

    /// Set the repository flags
    pub fn set_repository_info(&self, private: bool, fork: bool) {
        self.state().repository = RepositoryInfo { private, fork };
    }

    /// Set whether head branches are up to date
    pub fn set_up_to_date(&self, up_to_date: bool) {
        self.state().up_to_date = up_to_date;
    }

    /// Set the response for `merge_pr`
    pub fn set_merge_response(&self, result: MergeResult) {
        self.state().merge_response = Some(result);
    }

    /// Mark a PR as merged on the forge
    pub fn mark_merged(&self, pr_number: u64) {
        if let Some(pr) = self.state().prs.get_mut(&pr_number) {
            pr.merged = true;
        }
    }

    /// Set the mergeable state of a PR
    pub fn set_mergeable(&self, pr_number: u64, mergeable: Option<bool>) {
        if let Some(pr) = self.state().prs.get_mut(&pr_number) {
            pr.mergeable = mergeable;
        }
    }

    /// Update the live labels of a PR
    pub fn set_labels(&self, pr_number: u64, labels: &[&str]) {
        if let Some(pr) = self.state().prs.get_mut(&pr_number) {
            pr.labels = labels.iter().map(ToString::to_string).collect();
        }
    }

    // === Error injection ===

    /// Make `get_pr_details` return an error
    pub fn fail_get_pr(&self, msg: &str) {
        self.state().error_on_get_pr = Some(msg.to_string());
    }

    /// Make `list_checks` return an error
    pub fn fail_list_checks(&self, msg: &str) {
        self.state().error_on_list_checks = Some(msg.to_string());
    }

    /// Make `is_strict_branch` return an error
    pub fn fail_strict(&self, msg: &str) {
        self.state().error_on_strict = Some(msg.to_string());
    }

    /// Make `merge_pr` return an error
    pub fn fail_merge_pr(&self, msg: &str) {
        self.state().error_on_merge_pr = Some(msg.to_string());
    }

    /// Make `add_labels` return an error
    pub fn fail_add_labels(&self, msg: &str) {
        self.state().error_on_add_labels = Some(msg.to_string());
    }

    // === Call verification ===

    /// Current labels of a PR
    pub fn labels(&self, pr_number: u64) -> Vec<String> {
        self.state()
            .prs
            .get(&pr_number)
            .map(|pr| pr.labels.clone())
            .unwrap_or_default()
    }

    /// Whether a PR currently carries a label
    pub fn has_label(&self, pr_number: u64, label: &str) -> bool {
        self.labels(pr_number).iter().any(|l| l == label)
    }

    /// All `add_labels` calls
    pub fn get_add_labels_calls(&self) -> Vec<AddLabelsCall> {
        self.state().add_labels_calls.clone()
    }

    /// All `remove_label` calls
    pub fn get_remove_label_calls(&self) -> Vec<RemoveLabelCall> {
        self.state().remove_label_calls.clone()
    }

    /// All `create_pr_comment` calls
    pub fn get_comment_calls(&self) -> Vec<CreateCommentCall> {
        self.state().comment_calls.clone()
    }

    /// All `merge_pr` calls
    pub fn get_merge_pr_calls(&self) -> Vec<MergePrCall> {
        self.state().merge_pr_calls.clone()
    }

    /// All `get_pr_details` calls
    pub fn get_pr_details_calls(&self) -> Vec<u64> {
        self.state().get_pr_details_calls.clone()
    }

    /// All `is_strict_branch` calls
    pub fn get_strict_calls(&self) -> Vec<String> {
        self.state().strict_calls.clone()
    }

    /// Number of label and comment writes
    pub fn write_count(&self) -> usize {
        let state = self.state();
        state.add_labels_calls.len() + state.remove_label_calls.len() + state.comment_calls.len()
    }

    /// Labels of the PR that start with a prefix
    pub fn labels_with_prefix(&self, pr_number: u64, prefix: &str) -> Vec<String> {
        self.labels(pr_number)
            .into_iter()
            .filter(|l| l.starts_with(prefix))
            .collect()
    }

    /// Assert that `merge_pr` was called for a specific PR
    pub fn assert_merge_called(&self, pr_number: u64) {
        let calls = self.get_merge_pr_calls();
        assert!(
            calls.iter().any(|c| c.pr_number == pr_number),
            "Expected merge_pr({pr_number}) but got: {calls:?}"
        );
    }

    /// Assert that `merge_pr` was NOT called for a specific PR
    pub fn assert_merge_not_called(&self, pr_number: u64) {
        let calls = self.get_merge_pr_calls();
        assert!(
            !calls.iter().any(|c| c.pr_number == pr_number),
            "Expected merge_pr({pr_number}) NOT to be called but it was: {calls:?}"
        );
    }

    /// Assert that no comment was posted
    pub fn assert_no_comment(&self) {
        let calls = self.get_comment_calls();
        assert!(calls.is_empty(), "Expected no comment but got: {calls:?}");
    }
}

#[async_trait]
impl PlatformService for MockPlatformService {
    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    async fn get_pr_details(&self, pr_number: u64) -> Result<PullRequestDetails> {
        let mut state = self.state();
        state.get_pr_details_calls.push(pr_number);
        if let Some(msg) = &state.error_on_get_pr {
            return Err(Error::GitHubApi(msg.clone()));
        }
        state
            .prs
            .get(&pr_number)
            .cloned()
            .ok_or_else(|| Error::GitHubApi(format!("PR #{pr_number} not found")))
    }

    async fn list_reviews(&self, pr_number: u64) -> Result<Vec<Review>> {
        Ok(self
            .state()
            .reviews
            .get(&pr_number)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_checks(&self, sha: &str) -> Result<Vec<Check>> {
        let state = self.state();
        if let Some(msg) = &state.error_on_list_checks {
            return Err(Error::GitHubApi(msg.clone()));
        }
        Ok(state.checks.get(sha).cloned().unwrap_or_default())
    }

    async fn is_strict_branch(&self, branch: &str) -> Result<bool> {
        let mut state = self.state();
        state.strict_calls.push(branch.to_string());
        if let Some(msg) = &state.error_on_strict {
            return Err(Error::GitHubApi(msg.clone()));
        }
        Ok(state.strict)
    }

    async fn get_repository_info(&self) -> Result<RepositoryInfo> {
        Ok(self.state().repository)
    }

    async fn is_up_to_date(&self, _pr: &PullRequestDetails) -> Result<bool> {
        Ok(self.state().up_to_date)
    }

    async fn add_labels(&self, pr_number: u64, labels: &[String]) -> Result<()> {
        let mut state = self.state();
        state.add_labels_calls.push(AddLabelsCall {
            pr_number,
            labels: labels.to_vec(),
        });
        if let Some(msg) = &state.error_on_add_labels {
            return Err(Error::GitHubApi(msg.clone()));
        }
        if let Some(pr) = state.prs.get_mut(&pr_number) {
            for label in labels {
                if !pr.labels.contains(label) {
                    pr.labels.push(label.clone());
                }
            }
        }
        Ok(())
    }

    async fn remove_label(&self, pr_number: u64, label: &str) -> Result<()> {
        let mut state = self.state();
        state.remove_label_calls.push(RemoveLabelCall {
            pr_number,
            label: label.to_string(),
        });
        if let Some(pr) = state.prs.get_mut(&pr_number) {
            pr.labels.retain(|l| l != label);
        }
        Ok(())
    }

    async fn create_pr_comment(&self, pr_number: u64, body: &str) -> Result<()> {
        self.state().comment_calls.push(CreateCommentCall {
            pr_number,
            body: body.to_string(),
        });
        Ok(())
    }

    async fn merge_pr(
        &self,
        pr_number: u64,
        method: MergeMethod,
        title: &str,
    ) -> Result<MergeResult> {
        let mut state = self.state();
        state.merge_pr_calls.push(MergePrCall {
            pr_number,
            method,
            title: title.to_string(),
        });
        if let Some(msg) = &state.error_on_merge_pr {
            return Err(Error::GitHubApi(msg.clone()));
        }
        let result = state
            .merge_response
            .clone()
            .unwrap_or_else(|| MergeResult::merged("Pull Request successfully merged"));
        if result.merged
            && let Some(pr) = state.prs.get_mut(&pr_number)
        {
            pr.merged = true;
        }
        Ok(result)
    }
}
