//! PR reconciliation engine
//!
//! [`Reconciler::process`] re-reads one PR, walks the ordered guards in
//! [`guards`] and applies the resulting outcome: wait, clean up, retry,
//! escalate, update the branch or merge. Any error left at the end is
//! escalated to a human before it is returned.

pub mod guards;
pub mod retry;

pub use guards::{Action, Outcome, RetryKind};
pub use retry::RetryManager;

use crate::config::{RepoConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::labels::LabelCodec;
use crate::mjolnir::Mjolnir;
use crate::platform::PlatformService;
use crate::types::{MergeMethod, PullRequestDetails};
use crate::workspace::Workspace;
use tracing::{debug, info};

/// Settings shared by every repository
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Retry policy
    pub retry: RetryConfig,
    /// Access token, redacted from comments
    pub token: String,
    /// Skip every write to GitHub
    pub dry_run: bool,
}

/// How a `process` call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// CI still running
    Waiting,
    /// PR was already merged; bot labels removed
    Cleaned,
    /// Retryable failure recorded on the PR
    Retrying {
        /// Attempt now encoded in the retry label
        attempt: u32,
    },
    /// Head branch rebased; merge happens on a later cycle
    Updated,
    /// PR merged
    Merged {
        /// Message reported by the merge
        message: String,
    },
}

/// Drives one repository's PRs through the merge procedure
pub struct Reconciler<'a> {
    platform: &'a dyn PlatformService,
    workspace: &'a dyn Workspace,
    codec: &'a LabelCodec,
    config: &'a RepoConfig,
    options: &'a EngineOptions,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler for the repository `platform` is bound to
    pub const fn new(
        platform: &'a dyn PlatformService,
        workspace: &'a dyn Workspace,
        codec: &'a LabelCodec,
        config: &'a RepoConfig,
        options: &'a EngineOptions,
    ) -> Self {
        Self {
            platform,
            workspace,
            codec,
            config,
            options,
        }
    }

    /// Process one PR
    ///
    /// Errors are escalated (comment, need-human-merge label, in-progress
    /// label removed) before being returned. A PR that cannot be read is
    /// not escalated since there is nothing to label.
    pub async fn process(&self, pr_number: u64) -> Result<Resolution> {
        let pr = self.platform.get_pr_details(pr_number).await?;
        info!(
            repo = %self.platform.config().full_name(),
            pr_number,
            url = %pr.html_url,
            "processing pull request"
        );

        let labels = self.retry_manager(&pr);
        match self.reconcile(&pr, &labels).await {
            Ok(resolution) => {
                debug!(pr_number, ?resolution, "pull request processed");
                Ok(resolution)
            }
            Err(e) => {
                labels.escalate(&pr, &e.to_string()).await;
                Err(e)
            }
        }
    }

    fn retry_manager(&self, pr: &PullRequestDetails) -> RetryManager<'a> {
        RetryManager::new(
            self.platform,
            self.codec,
            self.options.retry,
            &self.options.token,
            self.config.should_comment(pr.base.repo.private),
            self.options.dry_run,
        )
    }

    async fn reconcile(
        &self,
        pr: &PullRequestDetails,
        labels: &RetryManager<'_>,
    ) -> Result<Resolution> {
        match self.evaluate(pr, labels).await? {
            Outcome::Wait => {
                info!(pr_number = pr.number, "checks pending, waiting for CI");
                Ok(Resolution::Waiting)
            }
            Outcome::Cleanup => {
                info!(pr_number = pr.number, "already merged, cleaning labels");
                labels
                    .remove_present(pr, &self.codec.cleanup_labels())
                    .await;
                Ok(Resolution::Cleaned)
            }
            Outcome::Retry { kind, cause } => {
                info!(pr_number = pr.number, ?kind, cause = %cause, "retryable failure");
                let attempt = labels.manage(pr, kind, cause).await?;
                Ok(Resolution::Retrying { attempt: attempt.0 })
            }
            Outcome::Escalate(e) => Err(e),
            Outcome::Proceed(Action::Update) => self.update(pr, labels).await,
            Outcome::Proceed(Action::Merge(method)) => self.merge(pr, method, labels).await,
        }
    }

    /// Run the guards in order, fetching what each one needs
    async fn evaluate(
        &self,
        pr: &PullRequestDetails,
        labels: &RetryManager<'_>,
    ) -> Result<Outcome> {
        if let Some(outcome) = guards::check_milestone(self.config, pr) {
            return Ok(outcome);
        }

        let required = guards::required_approvals(self.config, self.codec, pr);
        let reviews = self.platform.list_reviews(pr.number).await?;
        if let Some(outcome) = guards::check_reviews(&reviews, required) {
            return Ok(outcome);
        }

        let checks = self.platform.list_checks(&pr.head.sha).await;
        if let Some(outcome) = guards::check_ci(checks) {
            return Ok(outcome);
        }

        if let Some(outcome) = guards::check_merged(pr) {
            return Ok(outcome);
        }
        if let Some(outcome) = guards::check_mergeable(pr) {
            return Ok(outcome);
        }

        labels.clean(pr).await;

        let mode = self.config.up_to_date_mode();
        let strict = if guards::needs_protection_lookup(mode) {
            self.platform.is_strict_branch(&pr.base.ref_name).await?
        } else {
            false
        };
        let need_up_to_date = guards::need_up_to_date(mode, strict);

        let method = guards::resolve_merge_method(self.config, self.codec, pr)?;

        let up_to_date = self.platform.is_up_to_date(pr).await?;
        if let Some(outcome) = guards::check_fast_forward(method, up_to_date) {
            return Ok(outcome);
        }

        if need_up_to_date && guards::needs_repository_info(pr) {
            let info = self.platform.get_repository_info().await?;
            if let Some(outcome) = guards::check_maintainer_edits(pr, info.private, info.fork) {
                return Ok(outcome);
            }
        }

        debug!(
            pr_number = pr.number,
            %method,
            need_up_to_date,
            up_to_date,
            "gates passed"
        );
        Ok(Outcome::Proceed(guards::decide_action(
            need_up_to_date,
            up_to_date,
            method,
        )))
    }

    async fn merge(
        &self,
        pr: &PullRequestDetails,
        method: MergeMethod,
        labels: &RetryManager<'_>,
    ) -> Result<Resolution> {
        info!(pr_number = pr.number, %method, "merging");
        let mjolnir = Mjolnir::new(self.platform, self.workspace, self.options.dry_run);
        let result = mjolnir.merge(pr, method).await?;
        if !result.merged {
            return Err(Error::MergeRejected(result.message));
        }

        info!(pr_number = pr.number, message = %result.message, "merged");
        labels
            .remove_present(pr, &self.codec.cleanup_labels())
            .await;
        Ok(Resolution::Merged {
            message: result.message,
        })
    }

    async fn update(
        &self,
        pr: &PullRequestDetails,
        labels: &RetryManager<'_>,
    ) -> Result<Resolution> {
        info!(pr_number = pr.number, "branch not up to date, updating");
        labels
            .add_labels(pr, &[self.codec.markers().merge_in_progress.clone()])
            .await;

        self.workspace
            .update(pr)
            .await
            .map_err(|e| Error::UpdateFailed(e.to_string()))?;
        Ok(Resolution::Updated)
    }
}
