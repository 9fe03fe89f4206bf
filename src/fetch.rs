//! Live pulls from the Snyk API.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::client::{AdvisoryFeed, SnykClient};
use crate::error::{Error, Result};
use crate::filter::LanguageFilter;
use crate::model::BoxedConvertible;

pub const CONSUMER_ID_VAR: &str = "SNYK_ID";
pub const READONLY_KEY_VAR: &str = "SNYK_READONLY_KEY";

/// API credentials, read from the environment on every fetch.
#[derive(Clone)]
pub struct Credentials {
    pub consumer_id: String,
    pub secret: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves both credentials through `lookup`. Missing and empty values
    /// are rejected, naming the variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let require = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(Error::MissingCredential(name))
        };

        let consumer_id = require(CONSUMER_ID_VAR)?;
        let secret = require(READONLY_KEY_VAR)?;
        Ok(Self {
            consumer_id,
            secret,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_id", &self.consumer_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Fetches every advisory modified since `since` and returns the ones
/// accepted by `filter`.
///
/// Credentials are checked before any request is made. When this returns
/// an error there is no channel to drain; on success the channel closes
/// once the upstream feed is exhausted.
pub async fn fetch_since(
    base_url: &str,
    user_agent: &str,
    since: i64,
    filter: &Arc<LanguageFilter>,
    capacity: usize,
) -> Result<mpsc::Receiver<BoxedConvertible>> {
    let credentials = Credentials::from_env()?;
    let client = SnykClient::new(
        base_url,
        user_agent,
        credentials.consumer_id,
        credentials.secret,
    )?
    .with_capacity(capacity);

    fetch_filtered(&client, since, filter, capacity).await
}

/// Pulls from any [`AdvisoryFeed`] and puts the language filter in front of
/// the result.
pub async fn fetch_filtered(
    feed: &dyn AdvisoryFeed,
    since: i64,
    filter: &Arc<LanguageFilter>,
    capacity: usize,
) -> Result<mpsc::Receiver<BoxedConvertible>> {
    if filter.is_empty() {
        info!("Fetching {} advisories since {}", feed.name(), since);
    } else {
        info!(
            "Fetching {} advisories since {} for languages {}",
            feed.name(),
            since,
            filter
        );
    }

    let advisories = feed.fetch_all_vulnerabilities(since).await?;
    Ok(filter.filter(advisories, capacity))
}
