use crate::{IssueFeedError, IssueFeedResult, SiteStatus};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait SiteProber: Send + Sync {
    /// Never fails: every transport problem collapses to `Unreachable`.
    async fn probe(&self, url: &str) -> SiteStatus;
}

#[async_trait]
impl<T> SiteProber for std::sync::Arc<T>
where
    T: SiteProber + ?Sized,
{
    async fn probe(&self, url: &str) -> SiteStatus {
        (**self).probe(url).await
    }
}

/// `HEAD` probe. Any HTTP response counts as `Active`; only a failed
/// exchange (timeout, DNS, refused connection, TLS) is `Unreachable`.
#[derive(Clone, Debug)]
pub struct HttpSiteProber {
    client: reqwest::Client,
}

impl HttpSiteProber {
    pub fn new(timeout: Duration) -> IssueFeedResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(crate::forge::FORGE_USER_AGENT)
            .build()
            .map_err(|err| IssueFeedError::Transport(format!("probe client build failed: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SiteProber for HttpSiteProber {
    async fn probe(&self, url: &str) -> SiteStatus {
        match self.client.head(url).send().await {
            Ok(response) => {
                tracing::debug!(url, status = response.status().as_u16(), "site probe answered");
                SiteStatus::Active
            }
            Err(err) => {
                tracing::debug!(url, error = %err, "site probe failed");
                SiteStatus::Unreachable
            }
        }
    }
}
