use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{error::ConfigError, points::PointSource, provider::tomtom::DEFAULT_ENDPOINT};

pub const DEFAULT_TIMEZONE: &str = "Asia/Ho_Chi_Minh";
pub const DEFAULT_OUTPUT: &str = "traffic_hourly.csv";

/// Environment variables that may carry the API key, in lookup order.
pub const API_KEY_VARS: [&str; 2] = ["TOMTOM_API_KEY", "API_KEY"];
pub const TIMEZONE_VAR: &str = "TRAFFIC_TIMEZONE";

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// TomTom API key. Usually left out of the file and supplied through
    /// the environment instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// IANA timezone used to stamp every record, e.g. "Asia/Ho_Chi_Minh".
    pub timezone: String,

    /// Pause after each request, in milliseconds.
    pub sleep_ms: u64,

    pub timeout_secs: u64,

    pub output: PathBuf,

    pub endpoint: String,

    pub source: PointSource,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            timezone: DEFAULT_TIMEZONE.to_string(),
            sleep_ms: 200,
            timeout_secs: 10,
            output: PathBuf::from(DEFAULT_OUTPUT),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            source: PointSource::default(),
        }
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

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
        let dirs = ProjectDirs::from("dev", "traffic-collector", "traffic-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay values from the environment. `lookup` is normally
    /// `|k| std::env::var(k).ok()`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = API_KEY_VARS.iter().find_map(|var| non_blank(lookup(var))) {
            self.api_key = Some(key);
        }
        if let Some(tz) = non_blank(lookup(TIMEZONE_VAR)) {
            self.timezone = tz;
        }
    }

    /// Returns the API key, if one is set and not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone.parse::<Tz>().map_err(|e| ConfigError::InvalidTimezone {
            name: self.timezone.clone(),
            reason: e.to_string(),
        })
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
