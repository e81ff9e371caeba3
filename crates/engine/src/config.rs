// Stepper - Pipeline Stepping Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Stepper configuration.
//!
//! Settings are read from a TOML file (by default `~/.stepper.toml`). Every
//! section is optional; missing values fall back to their defaults.
//!
//! ```toml
//! [cache]
//! max_entries = 100
//!
//! [session]
//! idle_timeout_secs = 600
//! default_timeout_ms = 30000
//!
//! [store]
//! root = "/var/lib/stepper/streams"
//!
//! [feeds.LEGACY_FEED]
//! encoding = "ISO-8859-1"
//! ```

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use stepper_common::DEFAULT_STEP_TIMEOUT_MS;
use tracing::debug;

use crate::store::FeedProperties;

/// Default number of step results a session keeps.
pub const DEFAULT_CACHE_ENTRIES: usize = 100;

/// Default time after which an unused session is dropped.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Encoding used when a feed does not configure one.
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepperConfig {
    /// Response cache settings
    pub cache: CacheConfig,
    /// Session settings
    pub session: SessionConfig,
    /// Stream store settings
    pub store: StoreConfig,
    /// Per-feed settings keyed by feed name
    pub feeds: BTreeMap<String, FeedConfig>,
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of step results kept per session
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: DEFAULT_CACHE_ENTRIES }
    }
}

/// Session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds after which an unused session is dropped
    pub idle_timeout_secs: u64,
    /// Timeout applied to requests that do not carry their own
    pub default_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            default_timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
        }
    }
}

impl SessionConfig {
    /// Idle timeout as a duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Stream store settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory of the filesystem store
    pub root: Option<PathBuf>,
}

/// Settings for one feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Character encoding of the feed's data
    pub encoding: Option<String>,
    /// Encodings of child streams keyed by child stream type
    pub child_encodings: BTreeMap<String, String>,
}

impl StepperConfig {
    /// Default location of the configuration file.
    pub fn config_path() -> Result<PathBuf> {
        let home =
            dirs::home_dir().ok_or_else(|| eyre::eyre!("Unable to determine home directory"))?;
        Ok(home.join(".stepper.toml"))
    }

    /// Load the configuration at `path`, or the defaults when no file exists there.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Self =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load the configuration from [`Self::config_path`].
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::config_path()?)
    }

    /// Write the configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        debug!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Use a different store directory.
    pub fn with_store_root(mut self, root: PathBuf) -> Self {
        self.store.root = Some(root);
        self
    }

    /// Keep at most `max_entries` step results per session.
    pub fn with_cache_entries(mut self, max_entries: usize) -> Self {
        self.cache.max_entries = max_entries;
        self
    }

    /// Set the encoding of a feed.
    pub fn with_feed_encoding(mut self, feed: impl Into<String>, encoding: impl Into<String>) -> Self {
        self.feeds.entry(feed.into()).or_default().encoding = Some(encoding.into());
        self
    }

    /// Feed encodings as the store consumes them.
    pub fn feed_properties(&self) -> FeedProperties {
        let mut properties = FeedProperties::default();
        for (feed, config) in &self.feeds {
            if let Some(encoding) = &config.encoding {
                properties.set_encoding(feed, None, encoding);
            }
            for (child, encoding) in &config.child_encodings {
                properties.set_encoding(feed, Some(child), encoding);
            }
        }
        properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StepperConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, StepperConfig::default());
        assert_eq!(config.cache.max_entries, DEFAULT_CACHE_ENTRIES);
        assert_eq!(config.session.default_timeout_ms, DEFAULT_STEP_TIMEOUT_MS);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stepper.toml");
        fs::write(
            &path,
            r#"
                [cache]
                max_entries = 5

                [feeds.LEGACY]
                encoding = "ISO-8859-1"
            "#,
        )
        .unwrap();

        let config = StepperConfig::load(&path).unwrap();
        assert_eq!(config.cache.max_entries, 5);
        assert_eq!(config.session.idle_timeout_secs, DEFAULT_IDLE_TIMEOUT_SECS);
        assert_eq!(config.feed_properties().encoding("LEGACY", None), "ISO-8859-1");
        assert_eq!(config.feed_properties().encoding("OTHER", None), DEFAULT_ENCODING);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stepper.toml");
        fs::write(&path, "[cache\nmax_entries = ").unwrap();
        assert!(StepperConfig::load(&path).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stepper.toml");
        let config = StepperConfig::default()
            .with_cache_entries(7)
            .with_store_root(dir.path().join("streams"))
            .with_feed_encoding("FEED", "UTF-8");

        config.save(&path).unwrap();
        assert_eq!(StepperConfig::load(&path).unwrap(), config);
    }
}
