//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Local, Offset};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use mantra_core::RetentionPolicy;
use mantra_source::DEFAULT_LOOKBACK_HOURS;
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Where the retention horizon sits.
    pub retention: Retention,
    /// Fitness platform to sync from.
    pub source: SourceConfig,
}

/// Retention horizon setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// Anything that has already started is expired.
    Now,
    /// Anything that started before local midnight today is expired.
    #[default]
    StartOfDay,
}

impl Retention {
    /// Builds the engine policy, using the machine's current UTC offset.
    pub fn policy(self) -> RetentionPolicy {
        match self {
            Self::Now => RetentionPolicy::Now,
            Self::StartOfDay => RetentionPolicy::StartOfDay {
                offset: Local::now().offset().fix(),
            },
        }
    }
}

/// Fitness platform API settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// API base URL (e.g., `https://fit.example.com`).
    pub base_url: Option<String>,
    /// Bearer token for the API.
    pub api_key: Option<String>,
    /// Only sessions starting this many hours before now are imported.
    pub lookback_hours: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("lookback_hours", &self.lookback_hours)
            .finish()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("retention", &self.retention)
            .field("source", &self.source)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("mantra.db"),
            retention: Retention::default(),
            source: SourceConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    ///
    /// Later layers win: defaults, the user config file, `config_path`, then
    /// `MANTRA_*` environment variables (`MANTRA_SOURCE__API_KEY` sets
    /// `source.api_key`).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("MANTRA_").split("__"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for mantra.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("mantra"))
}

/// Returns the platform-specific data directory for mantra.
///
/// On Linux: `~/.local/share/mantra`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("mantra"))
}
