//! Retry and escalation
//!
//! The attempt counter lives in a `<retry prefix><n>` label on the PR, so it
//! survives restarts and is shared by every bot instance. Reading and
//! rewriting that label is not atomic: two overlapping runs can both see no
//! counter and both write attempt 1, or an external removal between read and
//! write resets the count. Either way escalation only comes later, never
//! earlier, so the race is tolerated instead of locked against.

use super::guards::RetryKind;
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::labels::{LabelCodec, RetryCount};
use crate::platform::PlatformService;
use crate::types::PullRequestDetails;
use tracing::{info, warn};

/// Prefix of escalation comments
const ESCALATION_PREFIX: &str = ":no_entry_sign: ";

/// Replaces the token in text shown outside the bot
pub fn redact(text: &str, token: &str) -> String {
    if token.is_empty() {
        text.to_string()
    } else {
        text.replace(token, "xxx")
    }
}

/// Label and comment writes for one repository
///
/// Every write is best-effort: a failure is logged and swallowed so that an
/// escalation never escalates again. In dry-run mode writes are only logged.
pub struct RetryManager<'a> {
    platform: &'a dyn PlatformService,
    codec: &'a LabelCodec,
    policy: RetryConfig,
    token: &'a str,
    comment_on_escalation: bool,
    dry_run: bool,
}

impl<'a> RetryManager<'a> {
    /// Create a manager
    ///
    /// `comment_on_escalation` is the repository's comment eligibility for escalations.
    pub const fn new(
        platform: &'a dyn PlatformService,
        codec: &'a LabelCodec,
        policy: RetryConfig,
        token: &'a str,
        comment_on_escalation: bool,
        dry_run: bool,
    ) -> Self {
        Self {
            platform,
            codec,
            policy,
            token,
            comment_on_escalation,
            dry_run,
        }
    }

    /// Whether the policy for `kind` is enabled
    pub const fn is_enabled(&self, kind: RetryKind) -> bool {
        match kind {
            RetryKind::OnMergeable => self.policy.on_mergeable,
            RetryKind::OnStatuses => self.policy.on_statuses,
        }
    }

    /// Schedule another attempt after a retryable failure
    ///
    /// Returns the attempt now recorded on the PR. When the policy is off or
    /// the budget is spent, returns the error the PR must be escalated with;
    /// the escalation itself is left to the caller.
    pub async fn manage(
        &self,
        pr: &PullRequestDetails,
        kind: RetryKind,
        cause: Error,
    ) -> Result<RetryCount> {
        let max = match u32::try_from(self.policy.number) {
            Ok(max) if max > 0 && self.is_enabled(kind) => max,
            _ => return Err(cause),
        };

        let Some((label, current)) = self.codec.find_retry(&pr.labels) else {
            let first = RetryCount(1);
            self.add_labels(
                pr,
                &[
                    self.codec.retry(first),
                    self.codec.markers().merge_in_progress.clone(),
                ],
            )
            .await;
            info!(pr_number = pr.number, attempt = first.0, max, cause = %cause, "retry scheduled");
            return Ok(first);
        };

        self.remove_label(pr, label).await;

        if current.0 >= max {
            return Err(Error::TooManyRetries {
                attempt: current.0,
                max,
                cause: cause.to_string(),
            });
        }

        let next = current.next();
        self.add_labels(pr, &[self.codec.retry(next)]).await;
        info!(pr_number = pr.number, attempt = next.0, max, cause = %cause, "retry scheduled");
        Ok(next)
    }

    /// Reset the attempt counter once the retryable gates pass
    pub async fn clean(&self, pr: &PullRequestDetails) {
        if !self.policy.any_enabled() {
            return;
        }
        if let Some((label, _)) = self.codec.find_retry(&pr.labels) {
            self.remove_label(pr, label).await;
        }
    }

    /// Hand the PR over to a human
    ///
    /// Posts the reason (when the repository allows comments), adds the
    /// need-human-merge marker and drops the in-progress marker.
    pub async fn escalate(&self, pr: &PullRequestDetails, reason: &str) {
        let reason = redact(reason, self.token);
        warn!(pr_number = pr.number, %reason, "escalating to a human");

        if self.comment_on_escalation {
            self.comment(pr, &format!("{ESCALATION_PREFIX}{reason}")).await;
        }
        self.add_labels(pr, &[self.codec.markers().need_human_merge.clone()])
            .await;
        self.remove_label(pr, &self.codec.markers().merge_in_progress)
            .await;
    }

    /// Add labels, logging any failure
    pub async fn add_labels(&self, pr: &PullRequestDetails, labels: &[String]) {
        let labels: Vec<String> = labels.iter().filter(|l| !l.is_empty()).cloned().collect();
        if labels.is_empty() {
            return;
        }
        info!(pr_number = pr.number, ?labels, dry_run = self.dry_run, "add labels");
        if self.dry_run {
            return;
        }
        if let Err(e) = self.platform.add_labels(pr.number, &labels).await {
            warn!(pr_number = pr.number, ?labels, error = %e, "failed to add labels");
        }
    }

    /// Remove a label, logging any failure
    pub async fn remove_label(&self, pr: &PullRequestDetails, label: &str) {
        if label.is_empty() {
            return;
        }
        info!(pr_number = pr.number, label, dry_run = self.dry_run, "remove label");
        if self.dry_run {
            return;
        }
        if let Err(e) = self.platform.remove_label(pr.number, label).await {
            warn!(pr_number = pr.number, label, error = %e, "failed to remove label");
        }
    }

    /// Remove every label of `labels` present on the PR
    pub async fn remove_present(&self, pr: &PullRequestDetails, labels: &[String]) {
        for label in labels.iter().filter(|l| pr.has_label(l)) {
            self.remove_label(pr, label).await;
        }
    }

    async fn comment(&self, pr: &PullRequestDetails, body: &str) {
        if self.dry_run {
            info!(pr_number = pr.number, %body, "dry run: comment not posted");
            return;
        }
        if let Err(e) = self.platform.create_pr_comment(pr.number, body).await {
            warn!(pr_number = pr.number, error = %e, "failed to add comment");
        }
    }
}
