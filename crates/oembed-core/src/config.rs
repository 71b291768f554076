//! Configuration for discovery, fetching and caching.
//!
//! Configuration is stored in TOML. Every section and every field is
//! optional; missing values take the defaults shown below.
//!
//! ## File Location
//!
//! [`Config::load`] reads `config.toml` from the platform config directory:
//! - Linux: `~/.config/oembed/config.toml`
//! - macOS: `~/Library/Application Support/dev.oembed.oembed/config.toml`
//! - Windows: `%APPDATA%\oembed\oembed\config\config.toml`
//!
//! ## Example Configuration File
//!
//! ```toml
//! [cache]
//! discovery_ttl_secs = 300
//! oembed_ttl_secs = 3600
//!
//! [fetch]
//! timeout_secs = 30
//! user_agent = "oembed-discovery/0.3.0"
//! discovery_max_redirects = 3
//! # oembed_max_redirects = 5   # absent: follow up to redirect_ceiling
//! redirect_ceiling = 20
//!
//! [providers]
//! path = "/etc/oembed/providers.json"
//! ```

use crate::fetcher::RedirectLimit;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache lifetimes
    pub cache: CacheSettings,
    /// HTTP behaviour
    pub fetch: FetchSettings,
    /// Provider registry source
    pub providers: ProviderSettings,
}

/// Lifetimes of the two caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// How long discovered links for a page stay cached.
    pub discovery_ttl_secs: u64,
    /// How long a captured oembed response stays cached.
    pub oembed_ttl_secs: u64,
}

impl CacheSettings {
    /// Discovery cache TTL.
    #[must_use]
    pub const fn discovery_ttl(&self) -> Duration {
        Duration::from_secs(self.discovery_ttl_secs)
    }

    /// Oembed response cache TTL.
    #[must_use]
    pub const fn oembed_ttl(&self) -> Duration {
        Duration::from_secs(self.oembed_ttl_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            discovery_ttl_secs: 300,
            oembed_ttl_secs: 3600,
        }
    }
}

/// HTTP client and redirect behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// `User-Agent` sent with every request.
    pub user_agent: String,

    /// Redirect limit when fetching a page for discovery.
    pub discovery_max_redirects: u32,

    /// Redirect limit when fetching an oembed endpoint.
    ///
    /// `None` leaves the limit unspecified; [`Self::redirect_ceiling`] still
    /// applies.
    pub oembed_max_redirects: Option<u32>,

    /// Hard cap on redirects followed when no limit is given.
    pub redirect_ceiling: u32,
}

impl FetchSettings {
    /// Redirect limit for discovery page fetches.
    #[must_use]
    pub const fn discovery_limit(&self) -> RedirectLimit {
        RedirectLimit::Limited(self.discovery_max_redirects)
    }

    /// Redirect limit for oembed endpoint fetches.
    #[must_use]
    pub fn oembed_limit(&self) -> RedirectLimit {
        RedirectLimit::from(self.oembed_max_redirects)
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("oembed-discovery/", env!("CARGO_PKG_VERSION")).to_string(),
            discovery_max_redirects: 3,
            oembed_max_redirects: None,
            redirect_ceiling: 20,
        }
    }
}

/// Where provider rules come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// JSON provider list; the built-in table is used when absent.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default location, or defaults if no file
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config directory cannot be determined (unsupported platform)
    /// - The config file exists but cannot be read
    /// - The config file exists but is not valid TOML for this schema
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Path of the default configuration file.
    pub fn config_path() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("dev", "oembed", "oembed")
            .ok_or_else(|| Error::Config("Failed to determine project directories".into()))?;
        Ok(project_dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.cache.discovery_ttl(), Duration::from_secs(300));
        assert_eq!(config.cache.oembed_ttl(), Duration::from_secs(3600));
        assert_eq!(config.fetch.timeout_secs, 30);
        assert!(config.fetch.user_agent.starts_with("oembed-discovery/"));
        assert_eq!(config.fetch.discovery_limit(), RedirectLimit::Limited(3));
        assert_eq!(config.fetch.oembed_limit(), RedirectLimit::Unbounded);
        assert_eq!(config.fetch.redirect_ceiling, 20);
        assert_eq!(config.providers.path, None);
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [cache]
            discovery_ttl_secs = 10

            [fetch]
            oembed_max_redirects = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.discovery_ttl_secs, 10);
        assert_eq!(config.cache.oembed_ttl_secs, 3600);
        assert_eq!(config.fetch.oembed_limit(), RedirectLimit::Limited(5));
        assert_eq!(config.fetch.discovery_max_redirects, 3);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let result = Config::from_toml_str("[cache]\ndiscovery_ttl_secs = \"soon\"");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[providers]\npath = \"/srv/providers.json\"").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(
            config.providers.path.as_deref(),
            Some(Path::new("/srv/providers.json"))
        );
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = Config::load_from(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_serialized_config_round_trips() {
        let mut config = Config::default();
        config.fetch.oembed_max_redirects = Some(2);
        let text = toml::to_string(&config).unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }
}
