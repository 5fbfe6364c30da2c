//! Discovery of pull requests to process
//!
//! Builds label queries, drains every search page, orders each repository's
//! PRs oldest-updated first and picks the one PR to work on per repository.

use crate::error::Result;
use crate::labels::LabelCodec;
use crate::types::IssueHit;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

/// One page of search results
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Hits on this page
    pub items: Vec<IssueHit>,
    /// Next page number, `None` on the last page
    pub next_page: Option<u32>,
}

/// Paginated issue search on the forge
#[async_trait]
pub trait IssueSearch: Send + Sync {
    /// Fetch one page (1-based) of results for a raw query
    async fn search_page(&self, query: &str, page: u32) -> Result<SearchPage>;
}

/// Open PRs grouped by `owner/name`, each group oldest-updated first
pub type GroupedIssues = BTreeMap<String, Vec<IssueHit>>;

/// Label filter for one search
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    /// Labels every result must carry
    pub labels: Vec<String>,
    /// Labels no result may carry
    pub excluded_labels: Vec<String>,
}

impl SearchCriteria {
    /// Require labels
    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels
            .extend(labels.into_iter().map(Into::into).filter(|l: &String| !l.is_empty()));
        self
    }

    /// Exclude labels
    #[must_use]
    pub fn with_excluded_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_labels
            .extend(labels.into_iter().map(Into::into).filter(|l: &String| !l.is_empty()));
        self
    }

    /// Search query scoped to a user or organization
    pub fn query(&self, user: &str) -> String {
        let mut query = format!("is:pr is:open user:{user}");
        for label in &self.labels {
            query.push_str(&format!(" label:\"{label}\""));
        }
        for label in &self.excluded_labels {
            query.push_str(&format!(" -label:\"{label}\""));
        }
        query
    }

    /// Whether a hit satisfies the filter
    pub fn matches(&self, hit: &IssueHit) -> bool {
        let has = |label: &String| hit.labels.contains(label);
        self.labels.iter().all(has) && !self.excluded_labels.iter().any(has)
    }
}

/// Runs label searches and selects the PR to process
pub struct Finder<'a> {
    search: &'a dyn IssueSearch,
    codec: &'a LabelCodec,
}

impl<'a> Finder<'a> {
    /// Create a finder
    pub const fn new(search: &'a dyn IssueSearch, codec: &'a LabelCodec) -> Self {
        Self { search, codec }
    }

    /// Find open PRs matching the criteria, grouped by repository
    ///
    /// Every page is fetched; any page error fails the whole search.
    pub async fn search(&self, user: &str, criteria: &SearchCriteria) -> Result<GroupedIssues> {
        let query = criteria.query(user);
        debug!(%query, "searching pull requests");

        let mut hits = Vec::new();
        let mut page = 1;
        loop {
            let result = self.search.search_page(&query, page).await?;
            hits.extend(result.items);
            match result.next_page {
                Some(next) => page = next,
                None => break,
            }
        }

        // The forge's label filter is trusted but re-checked locally
        hits.retain(|hit| criteria.matches(hit));
        Ok(group_by_repository(hits))
    }

    /// PR to work on in one repository group
    ///
    /// A PR already marked in progress is continued; otherwise the oldest.
    pub fn current_pull<'g>(&self, issues: &'g [IssueHit]) -> Option<&'g IssueHit> {
        let in_progress = &self.codec.markers().merge_in_progress;
        issues
            .iter()
            .find(|hit| hit.labels.contains(in_progress))
            .or_else(|| issues.first())
    }
}

/// Group hits by repository, each group stably sorted oldest-updated first
pub fn group_by_repository(hits: Vec<IssueHit>) -> GroupedIssues {
    let mut groups: GroupedIssues = BTreeMap::new();
    for hit in hits {
        groups.entry(hit.repository.clone()).or_default().push(hit);
    }
    for issues in groups.values_mut() {
        issues.sort_by_key(|hit| hit.updated_at);
    }
    groups
}
