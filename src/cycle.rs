//! One reconciliation pass over every repository
//!
//! Two searches run per pass: PRs queued for a fast-forward merge and PRs
//! requesting a merge. A repository with a queued fast-forward is left alone
//! for the pass. Every other repository gets its selected PR processed.

use crate::config::Configuration;
use crate::engine::{EngineOptions, Reconciler, Resolution};
use crate::error::{Error, Result};
use crate::labels::LabelCodec;
use crate::platform::{DEFAULT_TIMEOUT, GitHubConnection, PlatformConfig, PlatformService};
use crate::search::{Finder, IssueSearch, SearchCriteria};
use crate::server::CycleRunner;
use crate::types::MergeMethod;
use crate::workspace::{GitWorkspace, Workspace};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info, warn};

/// Creates the repository-scoped forge service for a repository
pub trait RepositoryProvider: Send + Sync {
    /// Service bound to `config`
    fn repository(&self, config: &PlatformConfig) -> Box<dyn PlatformService>;
}

impl RepositoryProvider for GitHubConnection {
    fn repository(&self, config: &PlatformConfig) -> Box<dyn PlatformService> {
        Box::new(Self::repository(self, &config.owner, &config.repo))
    }
}

/// What happened to one repository's selected PR
#[derive(Debug)]
pub struct ProcessedPull {
    /// `owner/name`
    pub repository: String,
    /// PR number
    pub number: u64,
    /// Result of processing
    pub result: Result<Resolution>,
}

/// Summary of a pass
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Processed PRs, one per repository
    pub processed: Vec<ProcessedPull>,
    /// Repositories skipped because a fast-forward merge is queued
    pub skipped: Vec<String>,
}

impl CycleReport {
    /// Number of PRs whose processing failed
    pub fn failures(&self) -> usize {
        self.processed.iter().filter(|p| p.result.is_err()).count()
    }
}

/// Query for PRs waiting on a fast-forward merge
pub fn fast_forward_criteria(codec: &LabelCodec) -> SearchCriteria {
    let markers = codec.markers();
    SearchCriteria::default()
        .with_labels([codec.merge_method(MergeMethod::FastForward)])
        .with_excluded_labels([markers.no_merge.clone(), markers.need_merge.clone()])
}

/// Query for PRs requesting a merge
pub fn need_merge_criteria(codec: &LabelCodec) -> SearchCriteria {
    let markers = codec.markers();
    SearchCriteria::default()
        .with_labels([markers.need_merge.clone()])
        .with_excluded_labels([markers.need_human_merge.clone(), markers.no_merge.clone()])
}

/// A reconciliation pass and its collaborators
pub struct Cycle<'a> {
    search: &'a dyn IssueSearch,
    repositories: &'a dyn RepositoryProvider,
    workspace: &'a dyn Workspace,
    config: &'a Configuration,
    codec: LabelCodec,
    options: EngineOptions,
}

impl<'a> Cycle<'a> {
    /// Create a pass
    pub fn new(
        search: &'a dyn IssueSearch,
        repositories: &'a dyn RepositoryProvider,
        workspace: &'a dyn Workspace,
        config: &'a Configuration,
    ) -> Self {
        Self {
            search,
            repositories,
            workspace,
            config,
            codec: LabelCodec::new(config.markers.clone()),
            options: EngineOptions {
                retry: config.retry,
                token: config.github.token.clone(),
                dry_run: config.extra.dry_run,
            },
        }
    }

    /// Run the pass
    ///
    /// Fails only when a search fails; per-PR failures are already escalated
    /// and are reported in the returned summary.
    pub async fn run(&self) -> Result<CycleReport> {
        let user = &self.config.github.user;
        let finder = Finder::new(self.search, &self.codec);

        let fast_forward = finder
            .search(user, &fast_forward_criteria(&self.codec))
            .await?;
        let need_merge = finder
            .search(user, &need_merge_criteria(&self.codec))
            .await?;

        let mut report = CycleReport::default();
        for (full_name, issues) in &need_merge {
            if fast_forward.contains_key(full_name) {
                info!(repo = %full_name, "fast-forward merge queued, skipping repository");
                report.skipped.push(full_name.clone());
                continue;
            }

            let Some(hit) = finder.current_pull(issues) else {
                continue;
            };

            let result = self.process(full_name, hit.number).await;
            match &result {
                Ok(resolution) => {
                    info!(repo = %full_name, pr_number = hit.number, ?resolution, "done");
                }
                Err(e) => {
                    error!(repo = %full_name, pr_number = hit.number, error = %e, "processing failed");
                }
            }
            report.processed.push(ProcessedPull {
                repository: full_name.clone(),
                number: hit.number,
                result,
            });
        }

        if report.failures() > 0 {
            warn!(failures = report.failures(), "cycle finished with failures");
        }
        Ok(report)
    }

    async fn process(&self, full_name: &str, pr_number: u64) -> Result<Resolution> {
        let platform_config = PlatformConfig::from_full_name(full_name)
            .ok_or_else(|| Error::Config(format!("invalid repository name: {full_name}")))?;
        let platform = self.repositories.repository(&platform_config);
        let repo_config = self.config.repo_config(full_name);

        Reconciler::new(
            platform.as_ref(),
            self.workspace,
            &self.codec,
            repo_config,
            &self.options,
        )
        .process(pr_number)
        .await
    }
}

/// Production wiring: GitHub for search and PRs, git CLI for clones
pub struct Bot {
    config: Configuration,
    connection: GitHubConnection,
    workspace: GitWorkspace,
}

impl Bot {
    /// Connect to GitHub with a validated configuration
    pub fn new(config: Configuration) -> Result<Self> {
        let timeout = config
            .github
            .timeout_secs
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs);
        let connection = GitHubConnection::with_timeout(
            &config.github.token,
            config.github.url.as_deref(),
            timeout,
        )?;
        let workspace = GitWorkspace::new(
            config.git.clone(),
            config.github.token.clone(),
            config.extra.dry_run,
        );
        Ok(Self {
            config,
            connection,
            workspace,
        })
    }

    /// Run one pass
    pub async fn run_once(&self) -> Result<CycleReport> {
        Cycle::new(
            &self.connection,
            &self.connection,
            &self.workspace,
            &self.config,
        )
        .run()
        .await
    }
}

#[async_trait]
impl CycleRunner for Bot {
    async fn run_cycle(&self) -> Result<CycleReport> {
        self.run_once().await
    }
}
