//! Clients for upstream advisory APIs.

mod snyk;

pub use snyk::SnykClient;

use crate::error::Result;
use crate::model::Advisory;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A source of raw advisories.
#[async_trait]
pub trait AdvisoryFeed: Send + Sync {
    fn name(&self) -> &'static str;

    /// Requests every advisory modified at or after `since` (Unix seconds).
    ///
    /// On success the returned channel yields each advisory once and then
    /// closes.
    async fn fetch_all_vulnerabilities(&self, since: i64) -> Result<mpsc::Receiver<Advisory>>;
}
