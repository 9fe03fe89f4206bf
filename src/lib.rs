pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod logging;
pub mod model;
pub mod runner;

pub use config::Config;
pub use error::{Error, Result};
pub use filter::LanguageFilter;
pub use model::{Advisory, Convertible, NvdCveItem, NvdFeed};
pub use runner::{Provider, Runner, Snyk};
