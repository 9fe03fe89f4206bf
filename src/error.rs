//! Error types shared by the decoder, the fetch path and the converter.

/// The error type for every fallible operation in this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required credential is missing from the process environment.
    #[error("please set {0} in environment")]
    MissingCredential(&'static str),

    /// The input did not parse as a keyed collection of advisories.
    #[error("can't decode into vulns: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("can't encode feed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The advisory API answered with a non-success status.
    #[error("upstream returned {status} for {url}")]
    Upstream {
        status: reqwest::StatusCode,
        url: String,
    },

    /// The receiving side of an output channel went away mid-send.
    #[error("output channel closed")]
    ChannelClosed,

    #[error("can't convert advisory '{id}': {message}")]
    Convert { id: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn convert(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Convert {
            id: id.into(),
            message: message.into(),
        }
    }
}
