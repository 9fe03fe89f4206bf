use super::AdvisoryFeed;
use crate::decode::decode_advisories;
use crate::error::{Error, Result};
use crate::model::Advisory;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Default capacity of the channel returned by
/// [`SnykClient::fetch_all_vulnerabilities`].
const DEFAULT_CAPACITY: usize = 16;

/// Client for the Snyk vulnerability data API.
pub struct SnykClient {
    client: reqwest::Client,
    base_url: String,
    consumer_id: String,
    secret: String,
    capacity: usize,
}

impl SnykClient {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        consumer_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            consumer_id: consumer_id.into(),
            secret: secret.into(),
            capacity: DEFAULT_CAPACITY,
        })
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    #[cfg(test)]
    fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn feed_url(&self, since: i64) -> String {
        format!(
            "{}/vulnerabilities?since={}",
            self.base_url.trim_end_matches('/'),
            since
        )
    }

    async fn fetch(&self, since: i64) -> Result<Vec<Advisory>> {
        let url = self.feed_url(since);
        info!("Fetching Snyk advisories since {}", since);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.consumer_id, Some(&self.secret))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream { status, url });
        }

        let body = response.bytes().await?;
        decode_advisories(&body)
    }
}

#[async_trait]
impl AdvisoryFeed for SnykClient {
    fn name(&self) -> &'static str {
        "Snyk"
    }

    async fn fetch_all_vulnerabilities(&self, since: i64) -> Result<mpsc::Receiver<Advisory>> {
        let advisories = self.fetch(since).await?;
        debug!("Snyk returned {} advisories", advisories.len());

        let (tx, rx) = mpsc::channel(self.capacity);
        tokio::spawn(async move {
            for advisory in advisories {
                if tx.send(advisory).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }
}
