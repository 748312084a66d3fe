//! Configuration for the glucose analytics engine.
//!
//! Clinical thresholds and scoring cutoffs are deployment-tunable rather than
//! hard-coded; the defaults below follow common clinical conventions
//! (hypoglycemia below 70 mg/dL, hyperglycemia above 180 mg/dL).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bounds applied to incoming readings
    pub validation: ValidationConfig,
    /// Risk scoring thresholds and tier cutoffs
    pub risk: RiskConfig,
    /// Model training parameters
    pub training: TrainingConfig,
    /// Forecast horizon limits
    pub forecast: ForecastConfig,
}

/// Validation bounds for incoming readings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Lowest plausible glucose level in mg/dL
    pub min_glucose: f64,
    /// Highest plausible glucose level in mg/dL
    pub max_glucose: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_glucose: 20.0,
            max_glucose: 600.0,
        }
    }
}

/// Risk assessment thresholds.
///
/// The additive event weights keep the scoring monotonic: one more hypo or
/// hyper event can never lower the resulting tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Readings below this level count as hypoglycemia events (mg/dL)
    pub hypo_threshold: f64,
    /// Readings above this level count as hyperglycemia events (mg/dL)
    pub hyper_threshold: f64,
    /// Score contribution per hypoglycemia event
    pub hypo_event_weight: f64,
    /// Score contribution per hyperglycemia event
    pub hyper_event_weight: f64,
    /// Standard deviation above which variability is penalised (mg/dL)
    pub variability_threshold: f64,
    /// Score contribution when variability exceeds its threshold
    pub variability_weight: f64,
    /// Absolute trend slope above which the trend is penalised (mg/dL per hour)
    pub trend_threshold: f64,
    /// Score contribution when the trend exceeds its threshold
    pub trend_weight: f64,
    /// Scores below this cutoff classify as low risk
    pub medium_cutoff: f64,
    /// Scores below this cutoff (and at or above `medium_cutoff`) classify as medium risk
    pub high_cutoff: f64,
    /// 7-day mean below this level triggers a low-average recommendation (mg/dL)
    pub target_mean_min: f64,
    /// 7-day mean above this level triggers an elevated-average recommendation (mg/dL)
    pub target_mean_max: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            hypo_threshold: 70.0,
            hyper_threshold: 180.0,
            hypo_event_weight: 1.5,
            hyper_event_weight: 1.0,
            variability_threshold: 30.0,
            variability_weight: 1.0,
            trend_threshold: 2.0,
            trend_weight: 1.0,
            medium_cutoff: 2.0,
            high_cutoff: 5.0,
            target_mean_min: 80.0,
            target_mean_max: 150.0,
        }
    }
}

/// Model training parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Minimum usable (feature, target) pairs required to train
    pub min_training_samples: usize,
    /// Number of trees in the bagged ensemble
    pub tree_count: usize,
    /// Maximum depth of each regression tree
    pub max_depth: usize,
    /// Minimum samples per leaf node
    pub min_samples_leaf: usize,
    /// Denominator of the per-user chronological holdout (5 = last fifth)
    pub holdout_denominator: usize,
    /// Seed for bootstrap resampling; identical input yields identical models
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_training_samples: 10,
            tree_count: 100,
            max_depth: 10,
            min_samples_leaf: 2,
            holdout_denominator: 5,
            seed: 42,
        }
    }
}

/// Forecast horizon limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Maximum number of hours a single forecast request may cover
    pub max_hours_ahead: u32,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self { max_hours_ahead: 24 }
    }
}

impl EngineConfig {
    /// Load configuration from the default location, falling back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: EngineConfig = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("glucolens-engine")
            .join("config.json")
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
