//! `Workspace` implementation over the `git` command line.

use super::remotes::{RemoteLayout, is_protected_branch};
use super::{REMOTE_ORIGIN, Workspace};
use crate::config::GitConfig;
use crate::engine::retry::redact;
use crate::error::{Error, Result};
use crate::types::PullRequestDetails;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

const DIR_PREFIX: &str = "mergebot-";

/// Deadline of one git command when none is configured
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Temporary directory removed on drop
///
/// Created before anything else so that a failure at any later step of the
/// setup still removes what was written.
struct ScratchDir {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl ScratchDir {
    fn create() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix(DIR_PREFIX).tempdir()?;
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "created workspace");
        Ok(Self {
            path,
            dir: Some(dir),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take()
            && let Err(e) = dir.close()
        {
            warn!(path = %self.path.display(), error = %e, "failed to remove workspace");
        }
    }
}

/// Runs git inside one directory, redacting the token from any output
struct Git<'a> {
    dir: &'a Path,
    token: &'a str,
    timeout: Duration,
}

impl Git<'_> {
    fn redact(&self, text: &str) -> String {
        redact(text, self.token)
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let command = self.redact(&args.join(" "));
        debug!(%command, "git");

        // Dropping the future on timeout kills the child
        let output = Command::new("git")
            .args(args)
            .current_dir(self.dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| {
                Error::Git(format!(
                    "git {command} timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            })?
            .map_err(|e| Error::Git(format!("failed to execute git {command}: {e}")))?;

        let stdout = self.redact(&String::from_utf8_lossy(&output.stdout));
        if !output.status.success() {
            let stderr = self.redact(&String::from_utf8_lossy(&output.stderr));
            return Err(Error::Git(format!(
                "git {command} failed: {}",
                stderr.trim()
            )));
        }

        debug!(output = %stdout.trim(), "git done");
        Ok(stdout)
    }
}

/// Clones PR branches with the `git` CLI
pub struct GitWorkspace {
    git: GitConfig,
    token: String,
    dry_run: bool,
}

impl GitWorkspace {
    /// Create a workspace provider
    pub fn new(git: GitConfig, token: impl Into<String>, dry_run: bool) -> Self {
        Self {
            git,
            token: token.into(),
            dry_run,
        }
    }

    fn git_in<'a>(&'a self, scratch: &'a ScratchDir) -> Git<'a> {
        Git {
            dir: scratch.path(),
            token: &self.token,
            timeout: self
                .git
                .timeout_secs
                .map_or(DEFAULT_GIT_TIMEOUT, Duration::from_secs),
        }
    }

    /// Clone `layout.origin` at `layout.checkout`, add upstream, fetch the other side
    async fn prepare(&self, git: &Git<'_>, layout: &RemoteLayout) -> Result<()> {
        git.run(&[
            "clone",
            "--quiet",
            "--origin",
            REMOTE_ORIGIN,
            "--branch",
            &layout.checkout,
            &layout.origin.url,
            ".",
        ])
        .await?;

        if let Some(name) = self.git.user_name.as_deref() {
            git.run(&["config", "user.name", name]).await?;
        }
        if let Some(email) = self.git.user_email.as_deref() {
            git.run(&["config", "user.email", email]).await?;
        }

        if let Some(upstream) = &layout.upstream {
            git.run(&["remote", "add", upstream.name, &upstream.url])
                .await?;
        }
        git.run(&["fetch", "--quiet", layout.other_remote(), &layout.other_branch])
            .await?;
        Ok(())
    }

    async fn push(&self, git: &Git<'_>, branch: &str, force: bool) -> Result<()> {
        let mut args = vec!["push"];
        if force {
            args.push("--force-with-lease");
        }
        if self.dry_run {
            args.push("--dry-run");
        }
        args.extend([REMOTE_ORIGIN, branch]);
        git.run(&args).await?;
        Ok(())
    }
}

#[async_trait]
impl Workspace for GitWorkspace {
    async fn update(&self, pr: &PullRequestDetails) -> Result<()> {
        info!(
            pr_number = pr.number,
            base = %pr.base.ref_name,
            head = %pr.head.ref_name,
            "updating branch"
        );

        if pr.is_on_main_repository() && is_protected_branch(&pr.head.ref_name) {
            return Err(Error::Workspace(format!(
                "{} branch cannot be rebased",
                pr.head.ref_name
            )));
        }

        let scratch = ScratchDir::create()?;
        let git = self.git_in(&scratch);
        let layout = RemoteLayout::for_update(pr, &self.token, self.git.ssh);

        self.prepare(&git, &layout).await?;

        let onto = layout.other_ref();
        if let Err(e) = git.run(&["rebase", &onto]).await {
            if let Err(abort) = git.run(&["rebase", "--abort"]).await {
                debug!(error = %abort, "rebase abort failed");
            }
            return Err(e);
        }

        self.push(&git, &pr.head.ref_name, true).await
    }

    async fn fast_forward(&self, pr: &PullRequestDetails) -> Result<()> {
        info!(
            pr_number = pr.number,
            base = %pr.base.ref_name,
            head = %pr.head.ref_name,
            "fast-forwarding base branch"
        );

        let scratch = ScratchDir::create()?;
        let git = self.git_in(&scratch);
        let layout = RemoteLayout::for_fast_forward(pr, &self.token, self.git.ssh);

        self.prepare(&git, &layout).await?;
        git.run(&["merge", "--ff-only", &layout.other_ref()]).await?;
        self.push(&git, &pr.base.ref_name, false).await
    }
}
