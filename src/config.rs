//! Site and server configuration.
//!
//! ## Site config
//!
//! An optional `site.toml` in the content root tunes generation. Every key is
//! optional and unknown keys are rejected to catch typos early:
//!
//! ```toml
//! head = '<link rel="stylesheet" href="/style.css">'   # injected into every page
//! foot = "<p>© me</p>"
//! ignore = ["drafts", "README.md"]                     # entry names to skip
//! code_style = "base16-ocean.dark"                     # "" turns highlighting off
//!
//! [[custom_pages]]
//! url = "/subscribe"
//! template = "subscribe.html"
//! data = { FormAction = "https://example.com/subscribe" }
//! ```
//!
//! The file itself is never treated as content.
//!
//! ## Serve config
//!
//! [`ServeConfig`] carries the listener settings. It is built from CLI flags
//! and handed to [`crate::serve::serve`]; nothing is read from globals.

use crate::highlight::{self, DEFAULT_CODE_STYLE};
use crate::page::LinkMode;
use crate::types::CustomPage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name of the site config inside the content root.
pub const CONFIG_FILE: &str = "site.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Generation settings loaded from `site.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// HTML fragment handed to every default-page render as `head`.
    pub head: String,
    /// HTML fragment handed to every default-page render as `foot`.
    pub foot: String,
    /// Entry names (files or directories) skipped anywhere in the tree.
    pub ignore: Vec<String>,
    /// Template-only pages bound at fixed URLs.
    pub custom_pages: Vec<CustomPageEntry>,
    /// Style for fenced code blocks. Unset means [`DEFAULT_CODE_STYLE`],
    /// empty means no highlighting.
    pub code_style: Option<String>,
}

/// A `[[custom_pages]]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomPageEntry {
    pub url: String,
    pub template: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl SiteConfig {
    /// Validate config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for entry in &self.custom_pages {
            if !entry.url.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "custom page url {:?} must start with '/'",
                    entry.url
                )));
            }
            if entry.template.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "custom page {} has an empty template name",
                    entry.url
                )));
            }
            if !seen.insert(entry.url.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "custom page url {} declared twice",
                    entry.url
                )));
            }
        }
        if let Some(bad) = self
            .ignore
            .iter()
            .find(|name| name.is_empty() || name.contains('/'))
        {
            return Err(ConfigError::Validation(format!(
                "ignore entry {bad:?} must be a bare file or directory name"
            )));
        }
        let style = self.code_style();
        if !style.is_empty() && !highlight::style_names().iter().any(|s| *s == style) {
            return Err(ConfigError::Validation(format!(
                "unknown code_style {style:?}; available: {}",
                highlight::style_names().join(", ")
            )));
        }
        Ok(())
    }

    /// Effective code highlighting style, `""` when disabled.
    pub fn code_style(&self) -> &str {
        self.code_style.as_deref().unwrap_or(DEFAULT_CODE_STYLE)
    }

    /// Declared custom pages keyed by URL.
    pub fn custom_pages(&self) -> BTreeMap<String, CustomPage> {
        self.custom_pages
            .iter()
            .map(|e| {
                (
                    e.url.clone(),
                    CustomPage::new(e.template.clone(), e.data.clone()),
                )
            })
            .collect()
    }

    /// Whether an entry name is excluded by the `ignore` list.
    pub fn ignores(&self, name: &str) -> bool {
        self.ignore.iter().any(|n| n == name)
    }
}

/// Load `site.toml` from the content root.
///
/// Returns the default config when the file does not exist.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(SiteConfig::default());
    }
    let content = fs::read_to_string(&path)?;
    let config: SiteConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `site.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Site configuration
# ==================
# All settings are optional. Place this file at the root of the content
# directory as `site.toml`. Unknown keys cause an error.

# HTML fragment passed to the theme's default template as `head`.
# head = '<link rel="stylesheet" href="/style.css">'

# HTML fragment passed to the theme's default template as `foot`.
# foot = "<footer>Written by me</footer>"

# Entry names skipped anywhere in the content tree, in addition to hidden
# entries (anything starting with a dot, including .git).
ignore = []

# Syntax highlighting style for fenced code blocks. Bundled styles:
# InspiredGitHub, Solarized (dark), Solarized (light), base16-eighties.dark,
# base16-mocha.dark, base16-ocean.dark, base16-ocean.light.
# Set to "" to leave code blocks unstyled.
code_style = "InspiredGitHub"

# ---------------------------------------------------------------------------
# Custom pages
# ---------------------------------------------------------------------------
# Pages rendered straight from a theme template, bound at a fixed URL.
# Every key in `data` is available to the template by name.
#
# [[custom_pages]]
# url = "/subscribe"
# template = "subscribe.html"
# data = { FormAction = "https://example.com/subscribe" }
#
# [[custom_pages]]
# url = "/thanks"
# template = "message.html"
# data = { Title = "Thanks!", Message = "Check your inbox." }
"##
}

// =============================================================================
// Server settings
// =============================================================================

/// Listener settings for `serve`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServeConfig {
    /// Interface to bind, e.g. `127.0.0.1` or `0.0.0.0`.
    pub interface: String,
    pub port: u16,
    /// Rebuild the site on every request instead of once at startup.
    pub livereload: bool,
    /// Request worker threads. `None` means one per CPU core.
    pub workers: Option<usize>,
    pub link_mode: LinkMode,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: "127.0.0.1".to_string(),
            port: 8000,
            livereload: false,
            workers: None,
            link_mode: LinkMode::Dynamic,
        }
    }
}

impl ServeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::Validation(
                "workers must be at least 1".into(),
            ));
        }
        if self.interface.parse::<std::net::IpAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "interface {:?} is not an IP address",
                self.interface
            )));
        }
        Ok(())
    }
}

/// Resolve the effective worker count.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_workers(config: &ServeConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.workers.map(|n| n.min(cores)).unwrap_or(cores).max(1)
}
