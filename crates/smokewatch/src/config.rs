//! Configuration management for smokewatch.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::money::Centavos;
use crate::payment::FLAT_APPREHENSION_FEE;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "smokewatch";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "smokewatch.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "SMOKEWATCH_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SMOKEWATCH_`, sections separated
///    by `__`, e.g. `SMOKEWATCH_SEARCH__DEBOUNCE_MS=150`)
/// 2. TOML config file at `~/.config/smokewatch/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Fee configuration.
    pub fees: FeeConfig,
    /// Search configuration.
    pub search: SearchConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/smokewatch/smokewatch.db`
    pub database_path: Option<PathBuf>,
}

/// Fee-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Flat apprehension fee in centavos, added when an order includes it.
    pub apprehension_fee: Centavos,
}

/// Search-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Delay between the last keystroke and the query, in milliseconds.
    pub debounce_ms: u64,
    /// Number of results returned when none is requested.
    pub default_limit: usize,
    /// Upper bound on any requested number of results.
    pub max_limit: usize,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            apprehension_fee: FLAT_APPREHENSION_FEE,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            default_limit: 50,
            max_limit: 200,
        }
    }
}

impl SearchConfig {
    /// Resolve a requested result count against the configured bounds.
    #[must_use]
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        match requested {
            None | Some(0) => self.default_limit,
            Some(n) => n.min(self.max_limit),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `SMOKEWATCH_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let config: Config = Self::figment(&config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.fees.apprehension_fee.is_negative() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "apprehension_fee ({}) cannot be negative",
                    self.fees.apprehension_fee.get()
                ),
            });
        }

        if self.search.max_limit == 0 {
            return Err(Error::ConfigValidation {
                message: "max_limit must be greater than 0".to_string(),
            });
        }

        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            return Err(Error::ConfigValidation {
                message: format!(
                    "default_limit ({}) must be between 1 and max_limit ({})",
                    self.search.default_limit, self.search.max_limit
                ),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the search debounce delay as a Duration.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.search.debounce_ms)
    }
}
