//! Language (ecosystem) filtering of advisories.
//!
//! A [`LanguageFilter`] is built once while the command line is parsed and
//! is only read afterwards, so it can be shared between tasks behind an
//! [`Arc`].
//!
//! # Example
//!
//! ```
//! use snyk2nvd::LanguageFilter;
//!
//! let mut filter = LanguageFilter::new();
//! filter.set("go,python");
//! filter.set("js");
//!
//! assert!(filter.accepts_language("go"));
//! assert!(filter.accepts_language("js"));
//! assert!(!filter.accepts_language("ruby"));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::model::{Advisory, BoxedConvertible};

/// Set of accepted language tags. An empty filter accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageFilter {
    languages: HashSet<String>,
}

impl LanguageFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every non-empty entry of a comma-separated list.
    ///
    /// Repeated calls are additive, and an empty string changes nothing.
    pub fn set(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        self.languages.extend(
            value
                .split(',')
                .filter(|language| !language.is_empty())
                .map(str::to_string),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    pub fn accepts_language(&self, language: &str) -> bool {
        self.languages.is_empty() || self.languages.contains(language)
    }

    pub fn accepts(&self, advisory: &Advisory) -> bool {
        self.accepts_language(&advisory.language)
    }

    /// Spawns a task forwarding accepted advisories from `input` to the
    /// returned receiver.
    ///
    /// The returned channel closes once `input` is exhausted. If the
    /// receiver is dropped early the task stops instead of waiting on a
    /// send that can never complete.
    pub fn filter(
        self: &Arc<Self>,
        mut input: mpsc::Receiver<Advisory>,
        capacity: usize,
    ) -> mpsc::Receiver<BoxedConvertible> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let filter = Arc::clone(self);

        tokio::spawn(async move {
            let mut forwarded = 0usize;
            while let Some(advisory) = input.recv().await {
                if !filter.accepts(&advisory) {
                    continue;
                }
                if tx.send(Box::new(advisory) as BoxedConvertible).await.is_err() {
                    debug!("Consumer went away after {} advisories", forwarded);
                    return;
                }
                forwarded += 1;
            }
            debug!("Forwarded {} advisories", forwarded);
        });

        rx
    }
}

/// Renders the accepted languages comma-joined, in no particular order.
impl fmt::Display for LanguageFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let languages: Vec<&str> = self.languages.iter().map(String::as_str).collect();
        write!(f, "{}", languages.join(","))
    }
}

impl<S: AsRef<str>> FromIterator<S> for LanguageFilter {
    /// Feeds every item through [`LanguageFilter::set`].
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut filter = Self::new();
        for value in iter {
            filter.set(value.as_ref());
        }
        filter
    }
}
