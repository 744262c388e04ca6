use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    location::DEFAULT_IP_ENDPOINT,
    model::{Location, Units},
    provider::openweather::DEFAULT_BASE_URL,
};

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Settings for the IP-based position lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_IP_ENDPOINT.to_string(),
            timeout_secs: 5,
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// units = "imperial"
///
/// [default_location]
/// name = "Johannesburg"
/// lat = -26.2041
/// lon = 28.0473
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub units: Units,
    pub base_url: String,
    /// Overrides the platform cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Last-resort location when nothing else is known.
    pub default_location: Location,
    pub geolocation: GeolocationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            units: Units::Metric,
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_dir: None,
            default_location: Location::new("Johannesburg", -26.2041, 28.0473),
            geolocation: GeolocationConfig::default(),
        }
    }
}

impl Config {
    /// API key from the environment, falling back to the config file.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|key| !key.trim().is_empty()))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key.trim().to_string());
    }

    /// Load config from disk, or return the default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        cfg.default_location
            .coordinates()
            .with_context(|| format!("Invalid default_location in {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "skycast", "skycast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
