//! In-memory collaborators for driving the pipeline without a network.

use crate::enrich::{FeedFetcher, FeedOutcome, SiteProber};
use crate::forge::{ForgeClient, IssueQuery};
use crate::{IssueFeedError, IssueFeedResult, RawIssue, RawLabel, SiteStatus};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default)]
pub struct MockForge {
    inner: Arc<Mutex<MockForgeState>>,
}

#[derive(Clone, Debug, Default)]
struct MockForgeState {
    labels: Vec<RawLabel>,
    issues: Vec<RawIssue>,
    failing_page: Option<u32>,
    requested_pages: Vec<u32>,
    queries: Vec<IssueQuery>,
}

impl MockForge {
    pub fn with_issues(self, issues: Vec<RawIssue>) -> Self {
        self.update(|state| state.issues = issues);
        self
    }

    pub fn with_labels(self, names: &[&str]) -> Self {
        self.update(|state| {
            state.labels = names.iter().map(|name| RawLabel::named(*name)).collect();
        });
        self
    }

    /// Makes the given page answer with an http 502.
    pub fn failing_on_page(self, page: u32) -> Self {
        self.update(|state| state.failing_page = Some(page));
        self
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.read(|state| state.requested_pages.clone())
    }

    pub fn queries(&self) -> Vec<IssueQuery> {
        self.read(|state| state.queries.clone())
    }

    fn update(&self, apply: impl FnOnce(&mut MockForgeState)) {
        if let Ok(mut state) = self.inner.lock() {
            apply(&mut state);
        }
    }

    fn read<T>(&self, view: impl FnOnce(&MockForgeState) -> T) -> T
    where
        T: Default,
    {
        self.inner.lock().map(|state| view(&state)).unwrap_or_default()
    }
}

#[async_trait]
impl ForgeClient for MockForge {
    async fn list_labels(&self, _repo: &str) -> IssueFeedResult<Vec<RawLabel>> {
        let state = self
            .inner
            .lock()
            .map_err(|_| IssueFeedError::Transport("mock forge mutex poisoned".to_string()))?;
        Ok(state.labels.clone())
    }

    async fn list_issues_page(
        &self,
        query: &IssueQuery,
        page: u32,
    ) -> IssueFeedResult<Vec<RawIssue>> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| IssueFeedError::Transport("mock forge mutex poisoned".to_string()))?;
        state.requested_pages.push(page);
        state.queries.push(query.clone());
        if state.failing_page == Some(page) {
            return Err(IssueFeedError::Http {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }

        let per_page = query.per_page.max(1) as usize;
        let start = (page.saturating_sub(1) as usize).saturating_mul(per_page);
        Ok(state
            .issues
            .iter()
            .filter(|issue| query.state == "all" || issue.state == query.state)
            .skip(start)
            .take(per_page)
            .cloned()
            .collect())
    }
}

/// Reports `Active` for registered URLs and `Unreachable` for everything else.
#[derive(Clone, Debug, Default)]
pub struct MockSiteProber {
    active: BTreeSet<String>,
    probed: Arc<Mutex<Vec<String>>>,
}

impl MockSiteProber {
    pub fn with_active(mut self, url: impl Into<String>) -> Self {
        self.active.insert(url.into());
        self
    }

    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().map(|urls| urls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SiteProber for MockSiteProber {
    async fn probe(&self, url: &str) -> SiteStatus {
        if let Ok(mut probed) = self.probed.lock() {
            probed.push(url.to_string());
        }
        if self.active.contains(url) {
            SiteStatus::Active
        } else {
            SiteStatus::Unreachable
        }
    }
}

/// Serves registered feed bodies; unknown URLs degrade.
#[derive(Clone, Debug, Default)]
pub struct MockFeedFetcher {
    feeds: BTreeMap<String, String>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl MockFeedFetcher {
    pub fn with_feed(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.feeds.insert(url.into(), body.into());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().map(|urls| urls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FeedFetcher for MockFeedFetcher {
    async fn fetch(&self, url: &str) -> FeedOutcome {
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(url.to_string());
        }
        match self.feeds.get(url) {
            Some(body) => FeedOutcome::Fetched(body.clone()),
            None => FeedOutcome::Degraded,
        }
    }
}
