//! Mock workspace and search for testing

#![allow(dead_code)]

use async_trait::async_trait;
use mergebot::error::{Error, Result};
use mergebot::search::{IssueSearch, SearchPage};
use mergebot::types::{IssueHit, PullRequestDetails};
use mergebot::workspace::Workspace;
use std::collections::HashMap;
use std::sync::Mutex;

/// Records update and fast-forward requests instead of running git
#[derive(Default)]
pub struct MockWorkspace {
    update_calls: Mutex<Vec<u64>>,
    fast_forward_calls: Mutex<Vec<u64>>,
    error_on_update: Mutex<Option<String>>,
    error_on_fast_forward: Mutex<Option<String>>,
}

impl MockWorkspace {
    /// Make `update` fail
    pub fn fail_update(&self, msg: &str) {
        *self.error_on_update.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `fast_forward` fail
    pub fn fail_fast_forward(&self, msg: &str) {
        *self.error_on_fast_forward.lock().unwrap() = Some(msg.to_string());
    }

    /// PR numbers passed to `update`
    pub fn get_update_calls(&self) -> Vec<u64> {
        self.update_calls.lock().unwrap().clone()
    }

    /// PR numbers passed to `fast_forward`
    pub fn get_fast_forward_calls(&self) -> Vec<u64> {
        self.fast_forward_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Workspace for MockWorkspace {
    async fn update(&self, pr: &PullRequestDetails) -> Result<()> {
        self.update_calls.lock().unwrap().push(pr.number);
        match self.error_on_update.lock().unwrap().as_ref() {
            Some(msg) => Err(Error::Git(msg.clone())),
            None => Ok(()),
        }
    }

    async fn fast_forward(&self, pr: &PullRequestDetails) -> Result<()> {
        self.fast_forward_calls.lock().unwrap().push(pr.number);
        match self.error_on_fast_forward.lock().unwrap().as_ref() {
            Some(msg) => Err(Error::Git(msg.clone())),
            None => Ok(()),
        }
    }
}

/// Search results keyed by raw query, split into pages
#[derive(Default)]
pub struct MockSearch {
    pages: Mutex<HashMap<String, Vec<Vec<IssueHit>>>>,
    calls: Mutex<Vec<(String, u32)>>,
    error_on_page: Mutex<Option<u32>>,
}

impl MockSearch {
    /// Results for a query, one inner vector per page
    pub fn set_pages(&self, query: &str, pages: Vec<Vec<IssueHit>>) {
        self.pages.lock().unwrap().insert(query.to_string(), pages);
    }

    /// Make every request for this page number fail
    pub fn fail_page(&self, page: u32) {
        *self.error_on_page.lock().unwrap() = Some(page);
    }

    /// `(query, page)` of every request
    pub fn get_calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueSearch for MockSearch {
    async fn search_page(&self, query: &str, page: u32) -> Result<SearchPage> {
        self.calls.lock().unwrap().push((query.to_string(), page));
        if *self.error_on_page.lock().unwrap() == Some(page) {
            return Err(Error::GitHubApi(format!("search page {page} failed")));
        }

        let pages = self.pages.lock().unwrap();
        let Some(query_pages) = pages.get(query) else {
            return Ok(SearchPage::default());
        };
        let index = page.saturating_sub(1) as usize;
        let items = query_pages.get(index).cloned().unwrap_or_default();
        let next_page = (index + 1 < query_pages.len()).then_some(page + 1);
        Ok(SearchPage { items, next_page })
    }
}
