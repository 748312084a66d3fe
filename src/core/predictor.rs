//! Autoregressive multi-step glucose forecasting.
//!
//! Each step's prediction is appended to an owned working copy of the
//! history, so the next step sees it as its previous reading. Predictions
//! compound; nothing shared between concurrent calls is mutated.

use crate::config::ForecastConfig;
use crate::core::features;
use crate::core::trainer::ModelSnapshot;
use crate::error::EngineError;
use crate::types::{GlucoseReading, MomentOfDay};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Ensemble spread (mg/dL) at which confidence halves.
const CONFIDENCE_SPREAD_SCALE: f64 = 25.0;

/// Multiplicative confidence decay applied per autoregressive step.
const CONFIDENCE_DECAY_PER_STEP: f64 = 0.95;

/// One forecast step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Instant the prediction refers to
    pub timestamp: DateTime<Utc>,
    /// Predicted glucose level in mg/dL
    pub predicted_glucose: f64,
    /// Confidence in [0, 1], non-increasing across steps
    pub confidence: f64,
}

/// Forecast the next `hours_ahead` hourly glucose levels for one user.
///
/// Timestamps are strictly increasing at one-hour spacing, starting one hour
/// after the user's last known reading. `hours_ahead == 0` yields an empty
/// sequence; a user with no readings has no anchor point and fails with
/// `InsufficientData`.
pub fn forecast(
    snapshot: &ModelSnapshot,
    history: &[GlucoseReading],
    hours_ahead: u32,
    config: &ForecastConfig,
) -> Result<Vec<ForecastPoint>, EngineError> {
    if hours_ahead == 0 {
        return Ok(Vec::new());
    }
    if hours_ahead > config.max_hours_ahead {
        return Err(EngineError::Validation(format!(
            "hours_ahead {} exceeds the configured horizon of {}",
            hours_ahead, config.max_hours_ahead
        )));
    }

    let last = history.last().ok_or_else(|| {
        EngineError::InsufficientData("no readings to anchor the forecast".to_string())
    })?;
    let user_id = last.user_id;
    let last_known_time = last.timestamp;

    let mut working = history.to_vec();
    let mut points = Vec::with_capacity(hours_ahead as usize);
    let mut previous_confidence = 1.0_f64;

    for step in 1..=i64::from(hours_ahead) {
        let target_time = last_known_time + Duration::hours(step);
        let vector = features::build(&working, target_time);
        let (predicted, spread) = snapshot.forest.predict_with_spread(&vector.to_array());

        // Uncertainty compounds with each step: combine the ensemble spread
        // with an explicit per-step decay, and never let confidence rise
        let agreement = 1.0 / (1.0 + spread / CONFIDENCE_SPREAD_SCALE);
        let decayed = agreement * CONFIDENCE_DECAY_PER_STEP.powi((step - 1) as i32);
        let confidence = decayed.min(previous_confidence).clamp(0.0, 1.0);
        previous_confidence = confidence;

        points.push(ForecastPoint {
            timestamp: target_time,
            predicted_glucose: predicted,
            confidence,
        });

        // The next step treats this prediction as its previous reading
        working.push(GlucoseReading::new(
            user_id,
            predicted,
            target_time,
            MomentOfDay::Other,
        ));
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::core::trainer;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn history(levels: &[f64]) -> Vec<GlucoseReading> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        levels
            .iter()
            .enumerate()
            .map(|(i, &level)| {
                GlucoseReading::new(
                    1,
                    level,
                    start + Duration::days(i as i64),
                    MomentOfDay::Fasting,
                )
            })
            .collect()
    }

    fn trained_snapshot(levels: &[f64]) -> ModelSnapshot {
        let mut histories = BTreeMap::new();
        histories.insert(1, history(levels));
        let config = TrainingConfig {
            tree_count: 15,
            ..TrainingConfig::default()
        };
        trainer::train(&histories, &config).unwrap()
    }

    const LEVELS: [f64; 11] = [
        90.0, 95.0, 100.0, 105.0, 110.0, 105.0, 100.0, 95.0, 90.0, 85.0, 95.0,
    ];

    #[test]
    fn test_zero_hours_yields_empty_sequence() {
        let snapshot = trained_snapshot(&LEVELS);
        let points = forecast(&snapshot, &history(&LEVELS), 0, &ForecastConfig::default()).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn test_six_hours_yields_six_hourly_points() {
        let snapshot = trained_snapshot(&LEVELS);
        let readings = history(&LEVELS);
        let points = forecast(&snapshot, &readings, 6, &ForecastConfig::default()).unwrap();

        assert_eq!(points.len(), 6);
        let last_known = readings.last().unwrap().timestamp;
        for (i, point) in points.iter().enumerate() {
            assert_eq!(
                point.timestamp,
                last_known + Duration::hours(i as i64 + 1)
            );
        }
    }

    #[test]
    fn test_confidence_never_increases() {
        let snapshot = trained_snapshot(&LEVELS);
        let points =
            forecast(&snapshot, &history(&LEVELS), 8, &ForecastConfig::default()).unwrap();

        let mut previous = 1.0;
        for point in &points {
            assert!(point.confidence <= previous);
            assert!((0.0..=1.0).contains(&point.confidence));
            previous = point.confidence;
        }
    }

    #[test]
    fn test_empty_history_has_no_anchor() {
        let snapshot = trained_snapshot(&LEVELS);
        let err = forecast(&snapshot, &[], 3, &ForecastConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData(_)));
    }

    #[test]
    fn test_horizon_cap_is_enforced() {
        let snapshot = trained_snapshot(&LEVELS);
        let config = ForecastConfig { max_hours_ahead: 4 };
        let err = forecast(&snapshot, &history(&LEVELS), 5, &config).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_predictions_stay_physiological_for_stable_history() {
        let snapshot = trained_snapshot(&LEVELS);
        let points =
            forecast(&snapshot, &history(&LEVELS), 3, &ForecastConfig::default()).unwrap();

        for point in &points {
            assert!(
                (40.0..=400.0).contains(&point.predicted_glucose),
                "prediction {} outside plausible band",
                point.predicted_glucose
            );
        }
    }
}
