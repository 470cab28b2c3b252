//! Configuration Module
//!
//! Loads the TOML configuration file, validates it and derives the values
//! the cache engine needs.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::render::SiteSettings;

/// Capacity used when `max_cache_items` is missing or below 1
pub const DEFAULT_MAX_CACHE_ITEMS: usize = 1000;

/// Lower bound on the reaper interval, limiting write-lock traffic
pub const MIN_REAPER_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on the reaper interval
pub const MAX_REAPER_INTERVAL: Duration = Duration::from_secs(86_400);

/// Largest TTL kept by [`Config::normalized`]; also the largest `max-age`
/// HTTP caches are required to honor.
pub const MAX_CACHE_LIMIT: i64 = i32::MAX as i64;

const LOG_LEVELS: [&str; 3] = ["debug", "info", "error"];
const LOG_TYPES: [&str; 2] = ["text", "json"];

// == Config Error ==
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// == Config ==
/// Server configuration, mirroring the `[general]`, `[html]` and `[cache]`
/// tables of the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub html: HtmlConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Address to bind (required)
    pub listen_addr: String,
    /// Port to bind (required)
    pub listen_port: u16,
    /// `debug`, `info` or `error`
    pub log_level: String,
    /// `text` or `json`
    pub log_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HtmlConfig {
    /// Directory holding the Markdown sources (required)
    #[serde(rename = "markdown_rootdir")]
    pub markdown_root_dir: PathBuf,
    pub site_title: String,
    pub site_lang: String,
    pub site_author: String,
    pub base_css_url: String,
    pub screen_css_url: String,
    pub print_css_url: String,
    /// Only serve URLs ending in `.html`
    pub strict_html_url: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Watch the content root and clear the cache on changes
    pub hot_reload: bool,
    /// Entry TTL in seconds; `<= 0` keeps entries until invalidated
    pub cache_limit: i64,
    /// Capacity bound
    pub max_cache_items: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot_reload: false,
            cache_limit: 0,
            max_cache_items: DEFAULT_MAX_CACHE_ITEMS as i64,
        }
    }
}

impl Config {
    // == Loading ==
    /// Reads and parses a configuration file. Does not validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    // == Validation ==
    /// Checks required fields and enumerated values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.listen_addr.is_empty() {
            return Err(invalid("listen_addr", "is required"));
        }
        if self.general.listen_port == 0 {
            return Err(invalid("listen_port", "is required"));
        }
        let level = self.general.log_level.as_str();
        if !level.is_empty() && !LOG_LEVELS.contains(&level) {
            return Err(invalid("log_level", format!("must be one of {LOG_LEVELS:?}")));
        }
        let kind = self.general.log_type.as_str();
        if !kind.is_empty() && !LOG_TYPES.contains(&kind) {
            return Err(invalid("log_type", format!("must be one of {LOG_TYPES:?}")));
        }
        if self.html.markdown_root_dir.as_os_str().is_empty() {
            return Err(invalid("markdown_rootdir", "is required"));
        }
        Ok(())
    }

    // == Normalization ==
    /// Clamps the TTL into `0..=MAX_CACHE_LIMIT` (0 is indefinite) and a
    /// capacity below 1 to the default.
    pub fn normalized(mut self) -> Self {
        self.cache.cache_limit = self.cache.cache_limit.clamp(0, MAX_CACHE_LIMIT);
        if self.cache.max_cache_items < 1 {
            self.cache.max_cache_items = DEFAULT_MAX_CACHE_ITEMS as i64;
        }
        self
    }

    // == Derived Values ==
    pub fn ttl_seconds(&self) -> i64 {
        self.cache.cache_limit
    }

    pub fn max_entries(&self) -> usize {
        usize::try_from(self.cache.max_cache_items)
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CACHE_ITEMS)
    }

    /// Sweep interval: half the TTL, between one minute and one day.
    /// `None` when entries never expire by time.
    pub fn reaper_interval(&self) -> Option<Duration> {
        let ttl = u64::try_from(self.ttl_seconds()).ok().filter(|t| *t > 0)?;
        Some((Duration::from_secs(ttl) / 2).clamp(MIN_REAPER_INTERVAL, MAX_REAPER_INTERVAL))
    }

    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.general.listen_addr, self.general.listen_port)
    }

    pub fn site_settings(&self) -> SiteSettings {
        SiteSettings {
            title: self.html.site_title.clone(),
            language: self.html.site_lang.clone(),
            author: self.html.site_author.clone(),
            base_css_url: self.html.base_css_url.clone(),
            screen_css_url: self.html.screen_css_url.clone(),
            print_css_url: self.html.print_css_url.clone(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[general]
listen_addr = "127.0.0.1"
listen_port = 8080

[html]
markdown_rootdir = "./docs"
"#;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.cache.cache_limit, 0);
        assert_eq!(config.cache.max_cache_items, 1000);
        assert!(!config.cache.hot_reload);
        assert!(!config.html.strict_html_url);
    }

    #[test]
    fn test_parse_minimal() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.listen_socket(), "127.0.0.1:8080");
        assert_eq!(config.html.markdown_root_dir, PathBuf::from("./docs"));
        assert_eq!(config.max_entries(), 1000);
        assert!(config.reaper_interval().is_none());
    }

    #[test]
    fn test_parse_full() {
        let raw = r#"
[general]
listen_addr = "0.0.0.0"
listen_port = 3000
log_level = "debug"
log_type = "json"

[html]
markdown_rootdir = "/srv/md"
site_title = "Docs"
site_lang = "en"
strict_html_url = true

[cache]
hot_reload = true
cache_limit = 600
max_cache_items = 50
"#;
        let config = Config::from_toml_str(raw).unwrap();
        config.validate().unwrap();

        assert!(config.html.strict_html_url);
        assert!(config.cache.hot_reload);
        assert_eq!(config.ttl_seconds(), 600);
        assert_eq!(config.max_entries(), 50);
        assert_eq!(config.reaper_interval(), Some(Duration::from_secs(300)));
        assert_eq!(config.site_settings().title, "Docs");
    }

    #[test]
    fn test_validate_missing_required() {
        let config = Config::from_toml_str("[general]\nlisten_port = 1\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "listen_addr", .. })
        ));

        let config = Config::from_toml_str("[general]\nlisten_addr = \"x\"\nlisten_port = 1\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "markdown_rootdir", .. })
        ));
    }

    #[test]
    fn test_validate_enumerations() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        config.general.log_level = "trace".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "log_level", .. })
        ));

        config.general.log_level = "error".into();
        config.general.log_type = "xml".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "log_type", .. })
        ));
    }

    #[test]
    fn test_normalized_clamps_values() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        config.cache.cache_limit = -5;
        config.cache.max_cache_items = 0;

        let config = config.normalized();
        assert_eq!(config.ttl_seconds(), 0);
        assert_eq!(config.max_entries(), DEFAULT_MAX_CACHE_ITEMS);
    }

    #[test]
    fn test_reaper_interval_bounds() {
        let mut config = Config::default();
        config.cache.cache_limit = 30;
        assert_eq!(config.reaper_interval(), Some(MIN_REAPER_INTERVAL));

        config.cache.cache_limit = i64::MAX;
        assert_eq!(config.reaper_interval(), Some(MAX_REAPER_INTERVAL));

        config.cache.cache_limit = 0;
        assert_eq!(config.reaper_interval(), None);
    }

    #[test]
    fn test_normalized_clamps_huge_ttl() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        config.cache.cache_limit = 10_000_000_000_000;

        let config = config.normalized();
        assert_eq!(config.ttl_seconds(), MAX_CACHE_LIMIT);
        assert_eq!(config.reaper_interval(), Some(MAX_REAPER_INTERVAL));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/docserve.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
