//! Configuration management for pagedecay
//!
//! Loads the TOML configuration file, applies profile and environment
//! overrides, and validates the result before any analysis runs.

use crate::analyzer::DecayThresholds;
use crate::error::{DecayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub thresholds: DecayThresholds,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

/// Batch sizing for an analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Maximum pages loaded from the store per run
    pub max_pages: usize,
    /// How many ranked results feed the recommendation generator
    pub top_recommendations: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_pages: 200,
            top_recommendations: 10,
        }
    }
}

/// Profile-specific threshold overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clicks_drop_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impressions_drop_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_drop_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookback_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_previous_clicks: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DecayError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DecayError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| DecayError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Load from `path`, or fall back to defaults when no file exists there.
    ///
    /// Env overrides, the optional profile and validation apply either way.
    pub fn load_or_default(path: &Path, profile: Option<&str>) -> Result<Self> {
        if path.exists() {
            return match profile {
                Some(profile) => Self::load_with_profile(path, profile),
                None => Self::load(path),
            };
        }

        tracing::warn!(
            "Config file not found at {}, using defaults. Run 'pagedecay config init' to create one.",
            path.display()
        );
        let mut config = Self::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(profile)?;
        }
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| DecayError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(v) = overrides.clicks_drop_percent {
            self.thresholds.clicks_drop_percent = v;
        }
        if let Some(v) = overrides.impressions_drop_percent {
            self.thresholds.impressions_drop_percent = v;
        }
        if let Some(v) = overrides.position_drop_threshold {
            self.thresholds.position_drop_threshold = v;
        }
        if let Some(v) = overrides.lookback_days {
            self.thresholds.lookback_days = v;
        }
        if let Some(v) = overrides.min_previous_clicks {
            self.thresholds.min_previous_clicks = v;
        }
        if let Some(v) = overrides.max_pages {
            self.analysis.max_pages = v;
        }

        tracing::debug!("Applied profile {}", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: PAGEDECAY_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("PAGEDECAY_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "THRESHOLDS__CLICKS_DROP_PERCENT" => {
                self.thresholds.clicks_drop_percent = parse_env(path, value)?;
            }
            "THRESHOLDS__IMPRESSIONS_DROP_PERCENT" => {
                self.thresholds.impressions_drop_percent = parse_env(path, value)?;
            }
            "THRESHOLDS__POSITION_DROP_THRESHOLD" => {
                self.thresholds.position_drop_threshold = parse_env(path, value)?;
            }
            "THRESHOLDS__LOOKBACK_DAYS" => {
                self.thresholds.lookback_days = parse_env(path, value)?;
            }
            "THRESHOLDS__MIN_PREVIOUS_CLICKS" => {
                self.thresholds.min_previous_clicks = parse_env(path, value)?;
            }
            "ANALYSIS__MAX_PAGES" => {
                self.analysis.max_pages = parse_env(path, value)?;
            }
            "ANALYSIS__TOP_RECOMMENDATIONS" => {
                self.analysis.top_recommendations = parse_env(path, value)?;
            }
            "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DecayError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("pagedecay").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| DecayError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".pagedecay"))
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| DecayError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.pagedecay"),
            },
            thresholds: DecayThresholds::default(),
            analysis: AnalysisConfig::default(),
            profiles: HashMap::new(),
        }
    }
}
