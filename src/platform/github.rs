//! GitHub platform service implementation

use crate::error::{Error, Result};
use crate::platform::{PlatformConfig, PlatformService};
use crate::search::{IssueSearch, SearchPage};
use crate::types::{
    BranchRef, Check, CheckState, IssueHit, MergeMethod, MergeResult, PullRequestDetails,
    RepositoryInfo, RepositoryRef, Review, ReviewState,
};
use async_trait::async_trait;
use octocrab::Octocrab;
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

const DEFAULT_API_URL: &str = "https://api.github.com";

/// Search page size
const SEARCH_PER_PAGE: u8 = 25;

/// Page size for listings read through `Link` pagination
const LIST_PER_PAGE: u8 = 100;

/// Upper bound on pages followed for one listing
const MAX_PAGES: usize = 50;

/// Deadline of a single forge request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// REST response types for the read paths

#[derive(Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Deserialize)]
struct ApiLabel {
    name: String,
}

#[derive(Deserialize)]
struct ApiRepository {
    name: String,
    owner: ApiUser,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    clone_url: String,
    #[serde(default)]
    ssh_url: String,
}

impl From<ApiRepository> for RepositoryRef {
    fn from(repo: ApiRepository) -> Self {
        Self {
            owner: repo.owner.login,
            name: repo.name,
            clone_url: repo.clone_url,
            ssh_url: repo.ssh_url,
            private: repo.private,
            fork: repo.fork,
        }
    }
}

#[derive(Deserialize)]
struct ApiBranch {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: String,
    user: Option<ApiUser>,
    repo: Option<ApiRepository>,
}

impl TryFrom<ApiBranch> for BranchRef {
    type Error = Error;

    fn try_from(branch: ApiBranch) -> Result<Self> {
        let repo: RepositoryRef = branch
            .repo
            .ok_or_else(|| {
                Error::Platform(format!(
                    "repository of branch {} is no longer available",
                    branch.ref_name
                ))
            })?
            .into();
        let user = branch
            .user
            .map_or_else(|| repo.owner.clone(), |u| u.login);

        Ok(Self {
            ref_name: branch.ref_name,
            sha: branch.sha,
            user,
            repo,
        })
    }
}

#[derive(Deserialize)]
struct ApiPullRequest {
    number: u64,
    title: Option<String>,
    html_url: Option<String>,
    #[serde(default)]
    merged: bool,
    mergeable: Option<bool>,
    #[serde(default)]
    maintainer_can_modify: bool,
    milestone: Option<serde_json::Value>,
    #[serde(default)]
    labels: Vec<ApiLabel>,
    head: ApiBranch,
    base: ApiBranch,
}

impl TryFrom<ApiPullRequest> for PullRequestDetails {
    type Error = Error;

    fn try_from(pr: ApiPullRequest) -> Result<Self> {
        Ok(Self {
            number: pr.number,
            title: pr.title.unwrap_or_default(),
            html_url: pr.html_url.unwrap_or_default(),
            merged: pr.merged,
            mergeable: pr.mergeable,
            maintainer_can_modify: pr.maintainer_can_modify,
            has_milestone: pr.milestone.is_some_and(|m| !m.is_null()),
            labels: pr.labels.into_iter().map(|l| l.name).collect(),
            head: pr.head.try_into()?,
            base: pr.base.try_into()?,
        })
    }
}

/// Map a combined-status entry state to a check state
fn status_state(state: &str) -> CheckState {
    match state {
        "success" => CheckState::Success,
        "pending" => CheckState::Pending,
        _ => CheckState::Failure,
    }
}

/// Map a check run status/conclusion pair to a check state
fn check_run_state(status: &str, conclusion: Option<&str>) -> CheckState {
    if status != "completed" {
        return CheckState::Pending;
    }
    match conclusion {
        Some("success" | "neutral" | "skipped") => CheckState::Success,
        // Completed but no conclusion counts as failed
        _ => CheckState::Failure,
    }
}

/// Owner/name from a search hit's `repository_url`
fn repository_from_url(url: &str) -> Option<String> {
    let mut segments = url.trim_end_matches('/').rsplit('/');
    let name = segments.next()?;
    let owner = segments.next()?;
    Some(format!("{owner}/{name}"))
}

/// Shared GitHub clients, one per process
///
/// Hands out repository-scoped [`GitHubService`]s and runs issue searches.
#[derive(Clone)]
pub struct GitHubConnection {
    client: Octocrab,
    /// Token for raw HTTP requests
    token: String,
    /// HTTP client for raw requests
    http_client: Client,
    /// API base URL for raw requests
    api_url: String,
}

impl GitHubConnection {
    /// Create a connection, optionally against a GitHub Enterprise API URL
    pub fn new(token: &str, api_url: Option<&str>) -> Result<Self> {
        Self::with_timeout(token, api_url, DEFAULT_TIMEOUT)
    }

    /// Create a connection whose requests fail after `timeout`
    pub fn with_timeout(token: &str, api_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut builder = Octocrab::builder()
            .personal_token(token.to_string())
            .set_connect_timeout(Some(timeout))
            .set_read_timeout(Some(timeout))
            .set_write_timeout(Some(timeout));

        let api_url = if let Some(url) = api_url {
            builder = builder
                .base_uri(url)
                .map_err(|e| Error::GitHubApi(e.to_string()))?;
            url.trim_end_matches('/').to_string()
        } else {
            DEFAULT_API_URL.to_string()
        };

        let client = builder
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;

        let http_client = Client::builder()
            .user_agent("mergebot")
            .timeout(timeout)
            .build()
            .map_err(|e| Error::GitHubApi(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token: token.to_string(),
            http_client,
            api_url,
        })
    }

    /// Service bound to one repository
    pub fn repository(&self, owner: &str, repo: &str) -> GitHubService {
        GitHubService {
            connection: self.clone(),
            config: PlatformConfig {
                owner: owner.to_string(),
                repo: repo.to_string(),
            },
        }
    }

    async fn send(&self, url: &str) -> Result<Response> {
        let response = self
            .http_client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await?;
        Ok(response)
    }

    async fn get(&self, path: &str) -> Result<Response> {
        self.send(&format!("{}{path}", self.api_url)).await
    }

    async fn read_json<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::GitHubApi(format!("GET {path} returned {status}")));
        }
        response
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse {path}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.get(path).await?;
        Self::read_json(path, response).await
    }

    /// Fetch `path` and every page after it, following `Link: rel="next"`
    ///
    /// A failing page fails the whole listing. Next links pointing outside
    /// the API are refused so the token never leaves it.
    async fn get_pages<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut pages = Vec::new();
        let mut url = format!("{}{path}", self.api_url);
        loop {
            if pages.len() >= MAX_PAGES {
                return Err(Error::GitHubApi(format!(
                    "GET {path} has more than {MAX_PAGES} pages"
                )));
            }

            let response = self.send(&url).await?;
            let next = next_page_url(response.headers());
            pages.push(Self::read_json(path, response).await?);

            match next {
                Some(next) if next.starts_with(&self.api_url) => url = next,
                Some(next) => {
                    return Err(Error::GitHubApi(format!(
                        "GET {path}: next page {next} is outside {}",
                        self.api_url
                    )));
                }
                None => break,
            }
        }
        debug!(path, pages = pages.len(), "fetched pages");
        Ok(pages)
    }
}

/// Target of the `rel="next"` entry of a `Link` header
fn next_page_url(headers: &HeaderMap) -> Option<String> {
    headers
        .get(LINK)?
        .to_str()
        .ok()?
        .split(',')
        .find_map(|entry| {
            let (target, params) = entry.split_once(';')?;
            params
                .split(';')
                .any(|param| param.trim() == "rel=\"next\"")
                .then(|| {
                    target
                        .trim()
                        .trim_start_matches('<')
                        .trim_end_matches('>')
                        .to_string()
                })
        })
}

#[async_trait]
impl IssueSearch for GitHubConnection {
    async fn search_page(&self, query: &str, page: u32) -> Result<SearchPage> {
        debug!(query, page, "searching issues");
        let result = self
            .client
            .search()
            .issues_and_pull_requests(query)
            .sort("updated")
            .order("desc")
            .per_page(SEARCH_PER_PAGE)
            .page(page)
            .send()
            .await?;

        let items = result
            .items
            .into_iter()
            .filter_map(|issue| {
                let repository = repository_from_url(issue.repository_url.as_str())?;
                Some(IssueHit {
                    repository,
                    number: issue.number,
                    updated_at: issue.updated_at,
                    labels: issue.labels.into_iter().map(|l| l.name).collect(),
                })
            })
            .collect::<Vec<_>>();

        let next_page = result.next.is_some().then_some(page + 1);
        debug!(page, count = items.len(), ?next_page, "search page");
        Ok(SearchPage { items, next_page })
    }
}

/// GitHub service using octocrab
pub struct GitHubService {
    connection: GitHubConnection,
    config: PlatformConfig,
}

impl GitHubService {
    fn repo_path(&self, rest: &str) -> String {
        format!("/repos/{}/{}{rest}", self.config.owner, self.config.repo)
    }

    /// Legacy commit statuses via the combined status API, every page
    async fn commit_statuses(&self, sha: &str) -> Result<Vec<Check>> {
        #[derive(Deserialize)]
        struct CombinedStatus {
            total_count: u32,
            statuses: Vec<Status>,
        }

        #[derive(Deserialize)]
        struct Status {
            context: String,
            state: String,
        }

        let pages: Vec<CombinedStatus> = self
            .connection
            .get_pages(&self.repo_path(&format!(
                "/commits/{sha}/status?per_page={LIST_PER_PAGE}"
            )))
            .await?;

        let total = pages.first().map_or(0, |p| p.total_count);
        let checks: Vec<Check> = pages
            .into_iter()
            .flat_map(|p| p.statuses)
            .map(|s| Check::new(s.context, status_state(&s.state)))
            .collect();
        debug!(total, count = checks.len(), "commit statuses");
        Ok(checks)
    }

    /// GitHub Actions check runs, every page
    async fn check_runs(&self, sha: &str) -> Result<Vec<Check>> {
        #[derive(Deserialize)]
        struct CheckRunsResponse {
            total_count: u32,
            check_runs: Vec<CheckRun>,
        }

        #[derive(Deserialize)]
        struct CheckRun {
            name: String,
            status: String,
            conclusion: Option<String>,
        }

        let pages: Vec<CheckRunsResponse> = self
            .connection
            .get_pages(&self.repo_path(&format!(
                "/commits/{sha}/check-runs?per_page={LIST_PER_PAGE}"
            )))
            .await?;

        let total = pages.first().map_or(0, |p| p.total_count);
        let checks: Vec<Check> = pages
            .into_iter()
            .flat_map(|p| p.check_runs)
            .map(|r| {
                let state = check_run_state(&r.status, r.conclusion.as_deref());
                Check::new(r.name, state)
            })
            .collect();
        debug!(total, count = checks.len(), "check runs");
        Ok(checks)
    }
}

#[async_trait]
impl PlatformService for GitHubService {
    fn config(&self) -> &PlatformConfig {
        &self.config
    }

    async fn get_pr_details(&self, pr_number: u64) -> Result<PullRequestDetails> {
        debug!(pr_number, "getting PR details");
        let pr: ApiPullRequest = self
            .connection
            .get_json(&self.repo_path(&format!("/pulls/{pr_number}")))
            .await
            .map_err(|e| Error::GitHubApi(format!("failed to get pull request: {e}")))?;

        let details = PullRequestDetails::try_from(pr)?;
        debug!(pr_number, merged = details.merged, mergeable = ?details.mergeable, "got PR details");
        Ok(details)
    }

    async fn list_reviews(&self, pr_number: u64) -> Result<Vec<Review>> {
        #[derive(Deserialize)]
        struct ApiReview {
            user: Option<ApiUser>,
            state: String,
        }

        debug!(pr_number, "listing reviews");
        let pages: Vec<Vec<ApiReview>> = self
            .connection
            .get_pages(&self.repo_path(&format!(
                "/pulls/{pr_number}/reviews?per_page={LIST_PER_PAGE}"
            )))
            .await?;

        Ok(pages
            .into_iter()
            .flatten()
            .filter_map(|r| {
                Some(Review {
                    reviewer: r.user?.login,
                    state: ReviewState::from(r.state.as_str()),
                })
            })
            .collect())
    }

    async fn list_checks(&self, sha: &str) -> Result<Vec<Check>> {
        debug!(sha, "listing checks");
        // GitHub has two CI systems; both must be consulted
        let mut checks = self.commit_statuses(sha).await?;
        checks.extend(self.check_runs(sha).await?);
        Ok(checks)
    }

    async fn is_strict_branch(&self, branch: &str) -> Result<bool> {
        #[derive(Deserialize)]
        struct RequiredStatusChecks {
            #[serde(default)]
            strict: bool,
        }

        let path = self.repo_path(&format!(
            "/branches/{branch}/protection/required_status_checks"
        ));
        let response = self.connection.get(&path).await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(branch, "no required status checks, not strict");
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(Error::GitHubApi(format!(
                "unable to get status checks: GET {path} returned {}",
                response.status()
            )));
        }

        let checks: RequiredStatusChecks = response
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse {path}: {e}")))?;
        debug!(branch, strict = checks.strict, "required status checks");
        Ok(checks.strict)
    }

    async fn get_repository_info(&self) -> Result<RepositoryInfo> {
        #[derive(Deserialize)]
        struct ApiRepositoryFlags {
            #[serde(default)]
            private: bool,
            #[serde(default)]
            fork: bool,
        }

        let repo: ApiRepositoryFlags = self
            .connection
            .get_json(&self.repo_path(""))
            .await
            .map_err(|e| {
                Error::GitHubApi(format!(
                    "unable to get repository information about {}: {e}",
                    self.config.full_name()
                ))
            })?;

        Ok(RepositoryInfo {
            private: repo.private,
            fork: repo.fork,
        })
    }

    async fn is_up_to_date(&self, pr: &PullRequestDetails) -> Result<bool> {
        #[derive(Deserialize)]
        struct Comparison {
            behind_by: u64,
        }

        let path = self.repo_path(&format!(
            "/compare/{}...{}:{}",
            pr.base.ref_name, pr.head.user, pr.head.ref_name
        ));
        let comparison: Comparison = self.connection.get_json(&path).await?;

        debug!(pr_number = pr.number, behind_by = comparison.behind_by, "compared branches");
        Ok(comparison.behind_by == 0)
    }

    async fn add_labels(&self, pr_number: u64, labels: &[String]) -> Result<()> {
        debug!(pr_number, ?labels, "adding labels");
        self.connection
            .client
            .issues(&self.config.owner, &self.config.repo)
            .add_labels(pr_number, labels)
            .await?;
        Ok(())
    }

    async fn remove_label(&self, pr_number: u64, label: &str) -> Result<()> {
        debug!(pr_number, label, "removing label");
        self.connection
            .client
            .issues(&self.config.owner, &self.config.repo)
            .remove_label(pr_number, label)
            .await?;
        Ok(())
    }

    async fn create_pr_comment(&self, pr_number: u64, body: &str) -> Result<()> {
        debug!(pr_number, "creating PR comment");
        self.connection
            .client
            .issues(&self.config.owner, &self.config.repo)
            .create_comment(pr_number, body)
            .await?;
        debug!(pr_number, "created PR comment");
        Ok(())
    }

    async fn merge_pr(
        &self,
        pr_number: u64,
        method: MergeMethod,
        title: &str,
    ) -> Result<MergeResult> {
        debug!(pr_number, %method, "merging PR");

        let octocrab_method = match method {
            MergeMethod::Squash => octocrab::params::pulls::MergeMethod::Squash,
            MergeMethod::Merge => octocrab::params::pulls::MergeMethod::Merge,
            MergeMethod::Rebase => octocrab::params::pulls::MergeMethod::Rebase,
            MergeMethod::FastForward => {
                return Err(Error::Platform(
                    "fast-forward merges are not performed by GitHub".to_string(),
                ));
            }
        };

        let result = self
            .connection
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .merge(pr_number)
            .method(octocrab_method)
            .title(title)
            .send()
            .await
            .map_err(|e| match e {
                octocrab::Error::GitHub { source, .. } => Error::GitHubApi(format!(
                    "Merge failed with status {}: {}",
                    source.status_code, source.message
                )),
                other => Error::GitHubApi(format!("Merge failed: {other}")),
            })?;

        let merge_result = MergeResult {
            merged: result.merged,
            message: result.message.unwrap_or_default(),
        };

        debug!(
            pr_number,
            merged = merge_result.merged,
            sha = ?result.sha,
            "merge complete"
        );
        Ok(merge_result)
    }
}
