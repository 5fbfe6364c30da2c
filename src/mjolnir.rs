//! Merge executor
//!
//! Two strategies share one interface: the forge's merge endpoint for
//! merge, squash and rebase, and a local fast-forward pushed to the base
//! branch for `ff`. The strategy is a pure function of the resolved method.

use crate::error::Result;
use crate::platform::PlatformService;
use crate::types::{MergeMethod, MergeResult, PullRequestDetails};
use crate::workspace::Workspace;
use async_trait::async_trait;
use tracing::{debug, info};

/// Message of the synthetic outcome returned in dry-run mode
pub const DRY_RUN_MESSAGE: &str = "Fake merge: dry run";

/// One way of merging a pull request
#[async_trait]
pub trait MergeStrategy: Send + Sync {
    /// Merge `pr` with `method`
    ///
    /// `Ok` with `merged == false` means the merge was refused; the engine
    /// treats it the same as an error.
    async fn execute(&self, pr: &PullRequestDetails, method: MergeMethod) -> Result<MergeResult>;
}

/// Merge through the forge's merge endpoint
pub struct ForgeMerge<'a> {
    platform: &'a dyn PlatformService,
    dry_run: bool,
}

impl<'a> ForgeMerge<'a> {
    /// Create the strategy
    pub const fn new(platform: &'a dyn PlatformService, dry_run: bool) -> Self {
        Self { platform, dry_run }
    }
}

#[async_trait]
impl MergeStrategy for ForgeMerge<'_> {
    async fn execute(&self, pr: &PullRequestDetails, method: MergeMethod) -> Result<MergeResult> {
        if self.dry_run {
            info!(pr_number = pr.number, %method, "dry run: skipping forge merge");
            return Ok(MergeResult::merged(DRY_RUN_MESSAGE));
        }

        debug!(pr_number = pr.number, %method, "merging through the forge");
        self.platform.merge_pr(pr.number, method, &pr.title).await
    }
}

/// Fast-forward the base branch locally and push it
///
/// The workspace pushes with `--dry-run` in dry-run mode, so the fast-forward
/// itself is still verified.
pub struct FastForwardMerge<'a> {
    workspace: &'a dyn Workspace,
}

impl<'a> FastForwardMerge<'a> {
    /// Create the strategy
    pub const fn new(workspace: &'a dyn Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl MergeStrategy for FastForwardMerge<'_> {
    async fn execute(&self, pr: &PullRequestDetails, method: MergeMethod) -> Result<MergeResult> {
        debug!(pr_number = pr.number, %method, "fast-forwarding");
        self.workspace.fast_forward(pr).await?;
        Ok(MergeResult::merged(format!(
            "{} fast-forwarded to {}",
            pr.base.ref_name, pr.head.sha
        )))
    }
}

/// Which strategy handles a method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Forge merge endpoint
    Forge,
    /// Local fast-forward
    FastForward,
}

/// Pick the strategy for a merge method
pub const fn strategy_for(method: MergeMethod) -> StrategyKind {
    match method {
        MergeMethod::FastForward => StrategyKind::FastForward,
        MergeMethod::Merge | MergeMethod::Squash | MergeMethod::Rebase => StrategyKind::Forge,
    }
}

/// Merge executor bound to one repository
pub struct Mjolnir<'a> {
    forge: ForgeMerge<'a>,
    fast_forward: FastForwardMerge<'a>,
}

impl<'a> Mjolnir<'a> {
    /// Create an executor
    pub const fn new(
        platform: &'a dyn PlatformService,
        workspace: &'a dyn Workspace,
        dry_run: bool,
    ) -> Self {
        Self {
            forge: ForgeMerge::new(platform, dry_run),
            fast_forward: FastForwardMerge::new(workspace),
        }
    }

    /// Merge `pr` with the strategy matching `method`
    pub async fn merge(&self, pr: &PullRequestDetails, method: MergeMethod) -> Result<MergeResult> {
        let strategy: &dyn MergeStrategy = match strategy_for(method) {
            StrategyKind::Forge => &self.forge,
            StrategyKind::FastForward => &self.fast_forward,
        };
        strategy.execute(pr, method).await
    }
}
