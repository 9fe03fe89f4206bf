//! Decoding of keyed advisory collections.
//!
//! The input is a single JSON object mapping opaque keys to advisories,
//! as found in Snyk feed dumps:
//!
//! ```json
//! { "SNYK-GOLANG-1": { "id": "SNYK-GOLANG-1", "language": "golang" } }
//! ```

use std::collections::HashMap;

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::filter::LanguageFilter;
use crate::model::{Advisory, BoxedConvertible};

/// Parses a keyed advisory collection. The keys are discarded.
///
/// Only the first JSON value is decoded; anything after it is ignored.
pub fn decode_advisories(bytes: &[u8]) -> Result<Vec<Advisory>> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let vulns = HashMap::<String, Advisory>::deserialize(&mut deserializer).map_err(Error::Decode)?;
    Ok(vulns.into_values().collect())
}

/// Reads the whole stream, then sends every advisory accepted by `filter`
/// to `output`.
///
/// Nothing is sent unless the leading object decodes; trailing data after
/// it is ignored. Advisories go out in no particular order, and `output`
/// is left open for the caller to close.
/// Sends wait for channel capacity, so a slow consumer throttles this call.
pub async fn read<R>(
    input: &mut R,
    filter: &LanguageFilter,
    output: &mpsc::Sender<BoxedConvertible>,
) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes).await?;

    let advisories = decode_advisories(&bytes)?;
    let total = advisories.len();

    let mut sent = 0usize;
    for advisory in advisories.into_iter().filter(|a| filter.accepts(a)) {
        output
            .send(Box::new(advisory))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        sent += 1;
    }

    debug!("Decoded {} advisories, {} accepted", total, sent);
    Ok(())
}
