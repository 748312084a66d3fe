//! Feature construction from reading histories.
//!
//! Features for a target instant are computed only from readings strictly
//! before that instant, so a vector built for a historical reading never
//! sees the reading itself or anything after it.

use crate::types::GlucoseReading;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Ordered feature names, matching `FeatureVector::to_array`.
pub const FEATURE_NAMES: [&str; 7] = [
    "hour_of_day",
    "day_of_week",
    "moment_encoded",
    "rolling_mean_7d",
    "rolling_std_7d",
    "previous_reading",
    "minutes_since_previous",
];

/// Categorical index used when no prior reading supplies a moment label.
pub const MOMENT_UNKNOWN_INDEX: f64 = 6.0;

/// Sentinel for `previous_reading` when the history is empty.
const NO_PREVIOUS_READING: f64 = 0.0;

/// Sentinel for `minutes_since_previous` when the history is empty (one day).
const NO_PREVIOUS_GAP_MINUTES: f64 = 1440.0;

/// Width of the rolling statistics window.
const ROLLING_WINDOW_DAYS: i64 = 7;

/// Numeric features describing a target instant and the history before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Hour of the target instant, 0-23
    pub hour_of_day: f64,
    /// Day of week of the target instant, 0 = Monday
    pub day_of_week: f64,
    /// Categorical moment index of the nearest prior reading
    pub moment_encoded: f64,
    /// Mean glucose over the 7 days preceding the target instant
    pub rolling_mean_7d: f64,
    /// Standard deviation over the same window
    pub rolling_std_7d: f64,
    /// Glucose level of the chronologically last prior reading
    pub previous_reading: f64,
    /// Minutes between that reading and the target instant
    pub minutes_since_previous: f64,
}

impl FeatureVector {
    /// Flatten into model input order (see [`FEATURE_NAMES`]).
    pub fn to_array(&self) -> [f64; 7] {
        [
            self.hour_of_day,
            self.day_of_week,
            self.moment_encoded,
            self.rolling_mean_7d,
            self.rolling_std_7d,
            self.previous_reading,
            self.minutes_since_previous,
        ]
    }
}

/// Build the feature vector for `target_time` from an ascending history.
///
/// Only readings with `timestamp < target_time` are considered. The function
/// has no side effects: identical inputs always yield identical output.
pub fn build(history: &[GlucoseReading], target_time: DateTime<Utc>) -> FeatureVector {
    let prior: Vec<&GlucoseReading> = history
        .iter()
        .filter(|r| r.timestamp < target_time)
        .collect();

    let window_start = target_time - Duration::days(ROLLING_WINDOW_DAYS);
    let window_levels: Vec<f64> = prior
        .iter()
        .filter(|r| r.timestamp >= window_start)
        .map(|r| r.glucose_level)
        .collect();

    let rolling_mean_7d = mean(&window_levels);
    let rolling_std_7d = std_dev(&window_levels);

    let (moment_encoded, previous_reading, minutes_since_previous) = match prior.last() {
        Some(last) => (
            last.moment_of_day.encoded(),
            last.glucose_level,
            (target_time - last.timestamp).num_seconds() as f64 / 60.0,
        ),
        None => (
            MOMENT_UNKNOWN_INDEX,
            NO_PREVIOUS_READING,
            NO_PREVIOUS_GAP_MINUTES,
        ),
    };

    FeatureVector {
        hour_of_day: target_time.hour() as f64,
        day_of_week: target_time.weekday().num_days_from_monday() as f64,
        moment_encoded,
        rolling_mean_7d,
        rolling_std_7d,
        previous_reading,
        minutes_since_previous,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0.0 for fewer than two values.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
