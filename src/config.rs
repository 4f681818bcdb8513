//! TOML configuration.
//!
//! ```toml
//! [source]
//! base_url = "https://www.sefaria.org/api/v3"
//! primary_language = "he"
//! secondary_language = "en"
//! primary_version = "source"
//! secondary_version = "translation"
//! fill_in_missing_segments = true
//! timeout_secs = 30
//!
//! [reader]
//! anchor_policy = "fixed"
//! ```
//!
//! Every field has a default, so an empty file (or no file, via
//! [`Config::minimal`]) is a valid configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Language tag of the version that supplies the primary text.
    #[serde(default = "default_primary_language")]
    pub primary_language: String,
    #[serde(default = "default_secondary_language")]
    pub secondary_language: String,
    /// Value sent as the first `version` query parameter.
    #[serde(default = "default_primary_version")]
    pub primary_version: String,
    /// Value sent as the second `version` query parameter.
    #[serde(default = "default_secondary_version")]
    pub secondary_version: String,
    #[serde(default = "default_fill_in")]
    pub fill_in_missing_segments: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            primary_language: default_primary_language(),
            secondary_language: default_secondary_language(),
            primary_version: default_primary_version(),
            secondary_version: default_secondary_version(),
            fill_in_missing_segments: default_fill_in(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.sefaria.org/api/v3".to_string()
}
fn default_primary_language() -> String {
    "he".to_string()
}
fn default_secondary_language() -> String {
    "en".to_string()
}
fn default_primary_version() -> String {
    "source".to_string()
}
fn default_secondary_version() -> String {
    "translation".to_string()
}
fn default_fill_in() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReaderConfig {
    /// `"fixed"` keeps prefetch anchored at the navigation chapter;
    /// `"advancing"` follows the loaded range.
    #[serde(default = "default_anchor_policy")]
    pub anchor_policy: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            anchor_policy: default_anchor_policy(),
        }
    }
}

fn default_anchor_policy() -> String {
    "fixed".to_string()
}

impl Config {
    /// Defaults for every section, used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

pub fn validate(config: &Config) -> Result<()> {
    let source = &config.source;

    if !(source.base_url.starts_with("http://") || source.base_url.starts_with("https://")) {
        anyhow::bail!(
            "source.base_url must start with http:// or https:// (got '{}')",
            source.base_url
        );
    }

    if source.primary_language.trim().is_empty() || source.secondary_language.trim().is_empty() {
        anyhow::bail!("source.primary_language and source.secondary_language must be set");
    }

    if source.primary_language == source.secondary_language {
        anyhow::bail!(
            "source.primary_language and source.secondary_language must differ (both '{}')",
            source.primary_language
        );
    }

    if source.timeout_secs == 0 {
        anyhow::bail!("source.timeout_secs must be > 0");
    }

    match config.reader.anchor_policy.as_str() {
        "fixed" | "advancing" => {}
        other => anyhow::bail!(
            "Unknown reader.anchor_policy: '{}'. Must be fixed or advancing.",
            other
        ),
    }

    Ok(())
}
