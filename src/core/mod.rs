//! Core analytics for the glucose engine.
//!
//! This module contains:
//! - Feature construction from reading histories
//! - The bagged regression-tree ensemble and its trainer
//! - Autoregressive multi-step forecasting
//! - Risk assessment and rule-based recommendations

pub mod features;
pub mod forest;
pub mod predictor;
pub mod recommend;
pub mod risk;
pub mod trainer;

// Re-export commonly used types
pub use features::{FeatureVector, FEATURE_NAMES};
pub use forest::{BaggedForest, ForestParams};
pub use predictor::{forecast, ForecastPoint};
pub use recommend::recommend;
pub use risk::{assess, RiskAssessment, RiskTier};
pub use trainer::{train, ModelSnapshot};
