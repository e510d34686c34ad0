//! Runtime configuration, read from a TOML file with defaults for every field.
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{Result, TennisError};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_path")]
    pub path: String,
    /// Matches played before this year are dropped at load time.
    #[serde(default = "default_min_year")]
    pub min_year: i32,
}

fn default_data_path() -> String {
    "data/atp_tennis.csv".to_string()
}

fn default_min_year() -> i32 {
    2020
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
            min_year: default_min_year(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureConfig {
    /// Number of most recent outcomes used for the recent-form rate.
    #[serde(default = "default_form_window")]
    pub form_window: usize,
}

fn default_form_window() -> usize {
    5
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            form_window: default_form_window(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_max_iterations() -> u64 {
    100
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            test_fraction: default_test_fraction(),
            seed: default_seed(),
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

fn default_output_dir() -> String {
    ".".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl Config {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            TennisError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.features.form_window == 0 {
            return Err(TennisError::Config(
                "features.form_window must be at least 1".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.model.test_fraction) {
            return Err(TennisError::Config(format!(
                "model.test_fraction must be in [0, 1), got {}",
                self.model.test_fraction
            )));
        }
        Ok(())
    }
}
