//! Reconciliation guards - pure decision steps
//!
//! Each guard looks at data already fetched from the forge and either lets
//! the PR through (`None`) or short-circuits with a tagged [`Outcome`]. No
//! I/O happens here, so every step is testable on plain values.

use crate::config::{RepoConfig, UpToDateMode};
use crate::error::Error;
use crate::labels::LabelCodec;
use crate::types::{Check, CheckState, MergeMethod, PullRequestDetails, Review, ReviewState};

/// Retry policy a retryable failure falls under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    /// PR not mergeable (conflicts, or GitHub still computing)
    OnMergeable,
    /// CI state unreadable or failing
    OnStatuses,
}

/// What to do with a PR that passed every gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Rebase the head branch onto its base; merge on a later cycle
    Update,
    /// Merge now with the resolved method
    Merge(MergeMethod),
}

/// Result of a guard evaluation
#[derive(Debug)]
pub enum Outcome {
    /// Nothing to do this cycle
    Wait,
    /// Already merged: remove bot labels
    Cleanup,
    /// Retryable failure
    Retry {
        /// Policy governing the retry
        kind: RetryKind,
        /// Failure reported if the PR ends up escalated
        cause: Error,
    },
    /// Fatal failure: hand over to a human
    Escalate(Error),
    /// All gates passed
    Proceed(Action),
}

/// Milestone gate
pub fn check_milestone(config: &RepoConfig, pr: &PullRequestDetails) -> Option<Outcome> {
    (config.need_milestone && !pr.has_milestone).then_some(Outcome::Escalate(Error::MissingMilestone))
}

/// Approvals needed, lowered when the light-review label is present
pub fn required_approvals(config: &RepoConfig, codec: &LabelCodec, pr: &PullRequestDetails) -> u32 {
    let light = &codec.markers().light_review;
    if !light.is_empty() && pr.has_label(light) {
        config.min_light_review
    } else {
        config.min_review
    }
}

/// Review gate
///
/// Comments and pending reviews carry no verdict and are skipped. The latest
/// remaining review of each reviewer wins: an approval counts, a dismissal
/// cancels it, and any other verdict fails the gate.
pub fn check_reviews(reviews: &[Review], required: u32) -> Option<Outcome> {
    let mut latest: Vec<(&str, &ReviewState)> = Vec::new();
    for review in reviews {
        if matches!(review.state, ReviewState::Commented | ReviewState::Pending) {
            continue;
        }
        match latest.iter_mut().find(|(who, _)| *who == review.reviewer) {
            Some(entry) => entry.1 = &review.state,
            None => latest.push((&review.reviewer, &review.state)),
        }
    }

    let mut approved = 0u32;
    for (reviewer, state) in &latest {
        match state {
            ReviewState::Approved => approved += 1,
            ReviewState::Dismissed => {}
            other => {
                return Some(Outcome::Escalate(Error::Reviews(format!(
                    "{reviewer} has reviewed with {other}"
                ))));
            }
        }
    }

    (approved < required).then(|| {
        Outcome::Escalate(Error::Reviews(format!(
            "need {required} approved reviews, got {approved}"
        )))
    })
}

/// Combine every check on the head commit into one state
///
/// Pending wins over failure so that a PR is never escalated while CI is
/// still running. No checks at all is a success.
pub fn aggregate_checks(checks: &[Check]) -> CheckState {
    if checks.iter().any(|c| c.state == CheckState::Pending) {
        CheckState::Pending
    } else if checks.iter().any(|c| c.state == CheckState::Failure) {
        CheckState::Failure
    } else {
        CheckState::Success
    }
}

/// CI gate, given the check listing (or the error that prevented it)
pub fn check_ci(checks: Result<Vec<Check>, Error>) -> Option<Outcome> {
    let checks = match checks {
        Ok(checks) => checks,
        Err(cause) => {
            return Some(Outcome::Retry {
                kind: RetryKind::OnStatuses,
                cause,
            });
        }
    };

    match aggregate_checks(&checks) {
        CheckState::Pending => Some(Outcome::Wait),
        CheckState::Failure => {
            let failed: Vec<&str> = checks
                .iter()
                .filter(|c| c.state == CheckState::Failure)
                .map(|c| c.name.as_str())
                .collect();
            Some(Outcome::Retry {
                kind: RetryKind::OnStatuses,
                cause: Error::ChecksFailed(failed.join(", ")),
            })
        }
        CheckState::Success => None,
    }
}

/// Already-merged gate
pub fn check_merged(pr: &PullRequestDetails) -> Option<Outcome> {
    pr.merged.then_some(Outcome::Cleanup)
}

/// Mergeable gate; an unknown state counts as not mergeable
pub fn check_mergeable(pr: &PullRequestDetails) -> Option<Outcome> {
    (pr.mergeable != Some(true)).then_some(Outcome::Retry {
        kind: RetryKind::OnMergeable,
        cause: Error::NotMergeable,
    })
}

/// Whether the mode needs a branch-protection lookup
pub const fn needs_protection_lookup(mode: UpToDateMode) -> bool {
    matches!(mode, UpToDateMode::UseBranchProtection)
}

/// Up-to-date requirement; `strict` is only consulted in branch-protection mode
pub const fn need_up_to_date(mode: UpToDateMode, strict: bool) -> bool {
    match mode {
        UpToDateMode::Off => false,
        UpToDateMode::UseBranchProtection => strict,
        UpToDateMode::Forced => true,
    }
}

/// Merge method: a label override wins over the repository default
pub fn resolve_merge_method(
    config: &RepoConfig,
    codec: &LabelCodec,
    pr: &PullRequestDetails,
) -> Result<MergeMethod, Error> {
    match codec.find_merge_method(&pr.labels) {
        Some(Ok(method)) => Ok(method),
        Some(Err(raw)) => Err(Error::UnknownMergeMethod(raw)),
        None => Ok(config.merge_method),
    }
}

/// Fast-forward precondition
pub fn check_fast_forward(method: MergeMethod, up_to_date: bool) -> Option<Outcome> {
    (method == MergeMethod::FastForward && !up_to_date)
        .then(|| Outcome::Escalate(Error::StaleFastForward(method.to_string())))
}

/// Maintainer-modification gate for updates
///
/// Pushing to a fork's branch requires the contributor to allow maintainer
/// edits, except on private or forked base repositories where GitHub grants
/// it anyway.
pub fn check_maintainer_edits(
    pr: &PullRequestDetails,
    base_private: bool,
    base_fork: bool,
) -> Option<Outcome> {
    (!pr.maintainer_can_modify && !pr.is_on_main_repository() && !base_private && !base_fork)
        .then_some(Outcome::Escalate(Error::MaintainerEditsDisabled))
}

/// Whether the maintainer gate needs the repository flags
pub fn needs_repository_info(pr: &PullRequestDetails) -> bool {
    !pr.maintainer_can_modify && !pr.is_on_main_repository()
}

/// Final branch between update and merge
pub const fn decide_action(need_up_to_date: bool, up_to_date: bool, method: MergeMethod) -> Action {
    if need_up_to_date && !up_to_date {
        Action::Update
    } else {
        Action::Merge(method)
    }
}
