//! Advisory data types and conversion into NVD CVE items.
//!
//! - [`Advisory`] - one Snyk vulnerability record
//! - [`NvdCveItem`] - one entry of an NVD JSON 1.1 feed
//! - [`NvdFeed`] - a complete feed document
//! - [`Convertible`] - anything that can become an [`NvdCveItem`]
//!
//! # Example
//!
//! ```
//! use snyk2nvd::model::{Advisory, Convertible};
//!
//! let advisory: Advisory = serde_json::from_str(
//!     r#"{"id": "SNYK-GOLANG-1", "language": "golang", "title": "Path traversal"}"#,
//! )?;
//! let item = advisory.convert()?;
//!
//! assert_eq!(item.cve.meta.id, "SNYK-GOLANG-1");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod advisory;
mod nvd;

pub use advisory::*;
pub use nvd::*;

use crate::error::Result;

/// Capability to turn a record into the common NVD output format.
pub trait Convertible: Send + Sync + std::fmt::Debug {
    fn convert(&self) -> Result<NvdCveItem>;
}

/// Owned, type-erased convertible as carried on output channels.
pub type BoxedConvertible = Box<dyn Convertible>;
