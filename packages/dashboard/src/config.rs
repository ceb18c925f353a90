//! Dashboard configuration loaded from TOML.
//!
//! The stock configuration ships with the crate as
//! [`DEFAULT_CONFIG_TOML`]. A user file only needs the keys it changes;
//! everything else falls back to [`DashboardConfig::default`].

use std::path::{Path, PathBuf};

use outbreak_watch_surveillance_models::Coordinates;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::QueryPolicy;

/// The stock configuration file, embedded at compile time.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Environment variable that overrides [`DashboardConfig::api_base_url`].
pub const API_URL_ENV: &str = "OUTBREAK_WATCH_API_URL";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has the wrong shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// A latitude/longitude pair as written in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CenterConfig {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl CenterConfig {
    /// As map coordinates.
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }
}

impl Default for CenterConfig {
    fn default() -> Self {
        Self {
            lat: 27.4842,
            lon: 94.9123,
        }
    }
}

/// Scoping applied to the nearby queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    /// Search radius in kilometres.
    pub radius_km: u32,
    /// Maximum results per nearby query.
    pub limit: u32,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            radius_km: 50,
            limit: 3,
        }
    }
}

/// Top-level dashboard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Base URL of the surveillance API.
    pub api_base_url: String,
    /// Center of interest before the user picks one.
    pub default_center: CenterConfig,
    /// Nearby query scoping.
    pub proximity: ProximityConfig,
    /// Retry and freshness policy.
    pub query: QueryPolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:5000/api".to_string(),
            default_center: CenterConfig::default(),
            proximity: ProximityConfig::default(),
            query: QueryPolicy::default(),
        }
    }
}

impl DashboardConfig {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not valid TOML or a
    /// value has the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads configuration from `path`, or the defaults when `path` is
    /// `None`, then applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or a
    /// value is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                log::debug!("Loaded config from {}", path.display());
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;

        Ok(config)
    }

    /// Applies overrides looked up through `lookup` (normally
    /// [`std::env::var`]).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|url| !url.trim().is_empty()) {
            log::info!("Using API URL from {API_URL_ENV}: {url}");
            self.api_base_url = url;
        }
    }

    /// Checks that every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api_base_url is empty".to_string()));
        }

        let CenterConfig { lat, lon } = self.default_center;
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ConfigError::Invalid(format!(
                "default_center.lat {lat} is outside [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(ConfigError::Invalid(format!(
                "default_center.lon {lon} is outside [-180, 180]"
            )));
        }

        if self.proximity.limit == 0 {
            return Err(ConfigError::Invalid(
                "proximity.limit must be positive".to_string(),
            ));
        }
        if self.proximity.radius_km == 0 {
            return Err(ConfigError::Invalid(
                "proximity.radius_km must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
