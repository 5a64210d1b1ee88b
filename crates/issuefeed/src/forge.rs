use crate::{ApiConfig, GeneratorConfig, IssueFeedError, IssueFeedResult, RawIssue, RawLabel};
use async_trait::async_trait;
use std::time::Duration;

pub const FORGE_ACCEPT: &str = "application/vnd.github+json";
pub const FORGE_USER_AGENT: &str = concat!("issuefeed/", env!("CARGO_PKG_VERSION"));

/// Query parameters shared by every page of one issue listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssueQuery {
    pub repo: String,
    pub state: String,
    pub labels: Vec<String>,
    pub sort: String,
    pub per_page: u32,
}

impl IssueQuery {
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            repo: config.issues.repo.clone(),
            state: config.state().to_string(),
            labels: config.issues.labels.clone(),
            sort: config.issues.sort.clone(),
            per_page: config.api.per_page,
        }
    }
}

#[async_trait]
pub trait ForgeClient: Send + Sync {
    async fn list_labels(&self, repo: &str) -> IssueFeedResult<Vec<RawLabel>>;
    async fn list_issues_page(&self, query: &IssueQuery, page: u32)
    -> IssueFeedResult<Vec<RawIssue>>;
}

#[async_trait]
impl<T> ForgeClient for std::sync::Arc<T>
where
    T: ForgeClient + ?Sized,
{
    async fn list_labels(&self, repo: &str) -> IssueFeedResult<Vec<RawLabel>> {
        (**self).list_labels(repo).await
    }

    async fn list_issues_page(
        &self,
        query: &IssueQuery,
        page: u32,
    ) -> IssueFeedResult<Vec<RawIssue>> {
        (**self).list_issues_page(query, page).await
    }
}

/// Fetches pages starting at 1 until a page comes back short.
pub async fn fetch_all_issues<C>(client: &C, query: &IssueQuery) -> IssueFeedResult<Vec<RawIssue>>
where
    C: ForgeClient + ?Sized,
{
    let mut issues = Vec::new();
    let mut page = 1;
    loop {
        let batch = client.list_issues_page(query, page).await?;
        let fetched = batch.len();
        tracing::debug!(repo = %query.repo, page, fetched, "fetched issue page");
        issues.extend(batch);
        if fetched < query.per_page as usize {
            break;
        }
        page += 1;
    }
    tracing::info!(repo = %query.repo, total = issues.len(), pages = page, "fetched issues");
    Ok(issues)
}

#[derive(Clone, Debug)]
pub struct ReqwestForgeClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ReqwestForgeClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> IssueFeedResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(FORGE_USER_AGENT)
            .build()
            .map_err(|err| IssueFeedError::Transport(format!("http client build failed: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.filter(|value| !value.trim().is_empty()),
        })
    }

    /// Reads the bearer token from the environment variable named in `api.token_env`.
    pub fn from_config(api: &ApiConfig) -> IssueFeedResult<Self> {
        let token = std::env::var(&api.token_env)
            .ok()
            .filter(|value| !value.trim().is_empty());
        Self::new(
            api.base_url.clone(),
            token,
            Duration::from_secs(api.timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> IssueFeedResult<T> {
        let mut request = self
            .client
            .get(self.endpoint(path))
            .header(reqwest::header::ACCEPT, FORGE_ACCEPT)
            .query(params);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| IssueFeedError::Transport(format!("http get failed: {err}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| IssueFeedError::Transport(format!("http read body failed: {err}")))?;
        if !status.is_success() {
            return Err(IssueFeedError::Http {
                status: status.as_u16(),
                body: truncate_for_error(&text),
            });
        }
        serde_json::from_str(&text)
            .map_err(|err| IssueFeedError::Decode(format!("{path}: {err}")))
    }
}

#[async_trait]
impl ForgeClient for ReqwestForgeClient {
    async fn list_labels(&self, repo: &str) -> IssueFeedResult<Vec<RawLabel>> {
        self.get_json(&format!("/repos/{repo}/labels"), &[("per_page", "100".to_string())])
            .await
    }

    async fn list_issues_page(
        &self,
        query: &IssueQuery,
        page: u32,
    ) -> IssueFeedResult<Vec<RawIssue>> {
        let mut params = vec![
            ("state", query.state.clone()),
            ("sort", query.sort.clone()),
            ("per_page", query.per_page.to_string()),
            ("page", page.to_string()),
        ];
        if !query.labels.is_empty() {
            params.push(("labels", query.labels.join(",")));
        }
        self.get_json(&format!("/repos/{}/issues", query.repo), &params)
            .await
    }
}

fn truncate_for_error(text: &str) -> String {
    const LIMIT: usize = 512;
    match text.char_indices().nth(LIMIT) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
