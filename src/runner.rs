//! Driving a provider into an NVD feed.
//!
//! A [`Provider`] exposes the two ways advisories enter the pipeline:
//! decoding a stream the caller already has, or pulling everything newer
//! than a watermark from the live API. [`Runner`] picks one, converts
//! whatever comes out and hands back an [`NvdFeed`].

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::decode;
use crate::error::{Error, Result};
use crate::fetch;
use crate::filter::LanguageFilter;
use crate::model::{BoxedConvertible, NvdCveItem, NvdFeed};

/// The entry points a [`Runner`] drives.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Decodes `input` and sends the resulting convertibles to `output`.
    /// `output` stays open; its owner decides when to close it.
    async fn read(
        &self,
        input: &mut (dyn AsyncRead + Send + Unpin),
        output: &mpsc::Sender<BoxedConvertible>,
    ) -> Result<()>;

    /// Pulls everything newer than `since` from the API at `base_url`.
    async fn fetch_since(
        &self,
        base_url: &str,
        user_agent: &str,
        since: i64,
    ) -> Result<mpsc::Receiver<BoxedConvertible>>;
}

/// Snyk advisories, restricted to a set of languages.
pub struct Snyk {
    filter: Arc<LanguageFilter>,
    capacity: usize,
}

impl Snyk {
    pub fn new(filter: LanguageFilter, capacity: usize) -> Self {
        Self {
            filter: Arc::new(filter),
            capacity: capacity.max(1),
        }
    }
}

#[async_trait]
impl Provider for Snyk {
    async fn read(
        &self,
        input: &mut (dyn AsyncRead + Send + Unpin),
        output: &mpsc::Sender<BoxedConvertible>,
    ) -> Result<()> {
        decode::read(input, &self.filter, output).await
    }

    async fn fetch_since(
        &self,
        base_url: &str,
        user_agent: &str,
        since: i64,
    ) -> Result<mpsc::Receiver<BoxedConvertible>> {
        fetch::fetch_since(base_url, user_agent, since, &self.filter, self.capacity).await
    }
}

pub struct Runner<P> {
    config: Config,
    provider: P,
}

impl<P: Provider> Runner<P> {
    pub fn new(config: Config, provider: P) -> Self {
        Self { config, provider }
    }

    /// Pulls advisories newer than `since` and converts them.
    pub async fn download(&self, since: i64) -> Result<NvdFeed> {
        let rx = self
            .provider
            .fetch_since(&self.config.base_url, &self.config.user_agent, since)
            .await?;

        let items = convert_all(rx).await?;
        info!("Downloaded {} advisories", items.len());
        Ok(NvdFeed::new(items))
    }

    /// Converts advisory dumps read from `inputs`, or from stdin when
    /// `inputs` is empty.
    pub async fn convert(&self, inputs: &[PathBuf]) -> Result<NvdFeed> {
        let (tx, rx) = mpsc::channel(self.config.capacity());

        let produce = async move {
            if inputs.is_empty() {
                self.provider.read(&mut tokio::io::stdin(), &tx).await?;
            }
            for path in inputs {
                let mut file = tokio::fs::File::open(path).await?;
                self.provider.read(&mut file, &tx).await?;
            }
            Ok::<(), Error>(())
        };

        let (produced, items) = tokio::join!(produce, convert_all(rx));
        // A failed conversion drops the receiver, which surfaces on the
        // producer side as ChannelClosed; report the conversion failure.
        let items = items?;
        produced?;

        info!("Converted {} advisories", items.len());
        Ok(NvdFeed::new(items))
    }
}

fn convertibles(rx: mpsc::Receiver<BoxedConvertible>) -> impl Stream<Item = BoxedConvertible> {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
}

async fn convert_all(rx: mpsc::Receiver<BoxedConvertible>) -> Result<Vec<NvdCveItem>> {
    convertibles(rx)
        .map(|item| {
            item.convert()
                .inspect_err(|e| warn!("Conversion failed: {}", e))
        })
        .try_collect()
        .await
}

/// Writes `feed` as pretty JSON to `path`, or to stdout when `path` is `None`.
pub fn write_feed(feed: &NvdFeed, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            let mut writer = std::io::BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, feed).map_err(Error::Encode)?;
            writer.flush()?;
            info!("Feed written to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, feed).map_err(Error::Encode)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}
