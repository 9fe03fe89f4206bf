//! Configuration file handling.
//!
//! The configuration file is optional and lives at:
//! - Linux: `~/.config/snyk2nvd/config.toml`
//! - macOS: `~/Library/Application Support/snyk2nvd/config.toml`
//! - Windows: `%APPDATA%\snyk2nvd\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! base_url = "https://data.snyk.io/api/v4"
//! user_agent = "snyk2nvd"
//! channel_capacity = 16
//! languages = ["golang", "js"]
//! ```
//!
//! Credentials never go here; they are read from `SNYK_ID` and
//! `SNYK_READONLY_KEY` at fetch time.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::filter::LanguageFilter;

pub const DEFAULT_BASE_URL: &str = "https://data.snyk.io/api/v4";
pub const DEFAULT_USER_AGENT: &str = "snyk2nvd";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the Snyk data API.
    pub base_url: String,

    /// `User-Agent` sent with every API request.
    pub user_agent: String,

    /// Buffer size of the advisory channels. Values below 1 are raised to 1.
    pub channel_capacity: usize,

    /// Languages to keep when no `--language` flag is given. Empty keeps all.
    pub languages: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            channel_capacity: 16,
            languages: Vec::new(),
        }
    }
}

impl Config {
    /// Loads the config file from its default location, or defaults if
    /// there is none.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Loads a config file from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("snyk2nvd")
            .join("config.toml")
    }

    pub fn capacity(&self) -> usize {
        self.channel_capacity.max(1)
    }

    /// Builds the language filter. Command-line values win over the
    /// configured list when any were given.
    pub fn language_filter(&self, cli_values: &[String]) -> LanguageFilter {
        if cli_values.is_empty() {
            self.languages.iter().collect()
        } else {
            cli_values.iter().collect()
        }
    }
}
