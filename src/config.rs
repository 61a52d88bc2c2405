//! Configuration management for Klaxon
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{KlaxonError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for Klaxon
///
/// Holds everything a monitoring run needs: the watched site, archive
/// access settings, notification channels, and state storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Watched site parameters
    #[serde(default)]
    pub site: SiteConfig,

    /// Archive endpoints, credentials, and fetch tuning
    #[serde(default)]
    pub archive: ArchiveSettings,

    /// Notification channel configuration
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Watermark state storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Watched site parameters
///
/// Usually supplied per run on the CLI; a config file entry makes sense for
/// a single-site cron deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Page URL to watch
    #[serde(default)]
    pub url: Option<String>,

    /// CSS selector scoping the watched region
    #[serde(default)]
    pub selector: Option<String>,

    /// Tag or attribute name pruned from both sides before comparison
    #[serde(default)]
    pub exclude_selector: Option<String>,
}

/// Archive access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSettings {
    /// Optional base URL override for the availability API
    ///
    /// When set, availability queries go to this base instead of the
    /// public archive, which allows tests to point Klaxon at a mock server.
    #[serde(default)]
    pub availability_base: Option<String>,

    /// Optional base URL override for the index, replay, and save APIs
    #[serde(default)]
    pub web_base: Option<String>,

    /// Access key forwarded to the save-page service
    #[serde(default)]
    pub access_key: Option<String>,

    /// Secret key forwarded to the save-page service
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Retry budget for each fetch
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-request timeout (seconds)
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,
}

fn default_max_attempts() -> u32 {
    8
}

fn default_fetch_timeout() -> u64 {
    60
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            availability_base: None,
            web_base: None,
            access_key: None,
            secret_key: None,
            max_attempts: default_max_attempts(),
            fetch_timeout_seconds: default_fetch_timeout(),
        }
    }
}

impl ArchiveSettings {
    /// Endpoint set derived from the configured bases
    pub fn endpoints(&self) -> crate::archive::ArchiveEndpoints {
        let mut endpoints = crate::archive::ArchiveEndpoints::default();
        if let Some(base) = &self.availability_base {
            endpoints.availability_base = base.trim_end_matches('/').to_string();
        }
        if let Some(base) = &self.web_base {
            endpoints.web_base = base.trim_end_matches('/').to_string();
        }
        endpoints
    }

    /// Credential headers for the save-page service, forwarded verbatim
    pub fn auth_headers(&self) -> Vec<(String, String)> {
        match (&self.access_key, &self.secret_key) {
            (Some(key), Some(secret)) => vec![(
                "authorization".to_string(),
                format!("LOW {}:{}", key, secret),
            )],
            _ => Vec::new(),
        }
    }

    /// Per-request timeout as a [`Duration`]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

/// Notification channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Primary webhook endpoint; log-only delivery when unset
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Secondary channel receiving the same subject/body pair
    #[serde(default)]
    pub secondary_webhook_url: Option<String>,

    /// Directory receiving rendered diff artifacts
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,
}

fn default_artifact_dir() -> String {
    "artifacts".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            secondary_webhook_url: None,
            artifact_dir: default_artifact_dir(),
        }
    }
}

/// Watermark state storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// State file path; the platform data directory when unset
    #[serde(default)]
    pub state_file: Option<String>,
}

impl Config {
    /// Load configuration from a file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - Parsed CLI arguments whose values override the file
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| KlaxonError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| KlaxonError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(key) = std::env::var("KLAXON_ACCESS_KEY") {
            self.archive.access_key = Some(key);
        }
        if let Ok(secret) = std::env::var("KLAXON_SECRET_KEY") {
            self.archive.secret_key = Some(secret);
        }
        if let Ok(url) = std::env::var("KLAXON_WEBHOOK_URL") {
            self.notify.webhook_url = Some(url);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let crate::cli::Commands::Run {
            site,
            selector,
            exclude,
        } = &cli.command
        {
            if let Some(site) = site {
                self.site.url = Some(site.clone());
            }
            if let Some(selector) = selector {
                self.site.selector = Some(selector.clone());
            }
            if let Some(exclude) = exclude {
                self.site.exclude_selector = Some(exclude.clone());
            }
        }
    }

    /// Validate the assembled configuration
    ///
    /// # Errors
    ///
    /// Returns [`KlaxonError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.site.url {
            url::Url::parse(url)
                .map_err(|e| KlaxonError::Config(format!("Invalid site.url {:?}: {}", url, e)))?;
        }

        if self.archive.max_attempts == 0 {
            return Err(
                KlaxonError::Config("archive.max_attempts must be greater than 0".to_string())
                    .into(),
            );
        }

        if self.archive.fetch_timeout_seconds == 0 {
            return Err(KlaxonError::Config(
                "archive.fetch_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.archive.access_key.is_some() != self.archive.secret_key.is_some() {
            return Err(KlaxonError::Config(
                "archive.access_key and archive.secret_key must be set together".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// The watched target, requiring the site parameters to be present
    ///
    /// # Errors
    ///
    /// Returns [`KlaxonError::Config`] when the URL or selector is missing
    /// from both the config file and the CLI.
    pub fn watch_target(&self) -> Result<crate::monitor::WatchTarget> {
        let url = self
            .site
            .url
            .clone()
            .ok_or_else(|| KlaxonError::Config("site.url is required".to_string()))?;
        let selector = self
            .site
            .selector
            .clone()
            .ok_or_else(|| KlaxonError::Config("site.selector is required".to_string()))?;

        Ok(crate::monitor::WatchTarget {
            url,
            selector,
            exclude_selector: self.site.exclude_selector.clone(),
        })
    }
}
