//! Short-term glycemic risk classification.
//!
//! The score is a sum of non-negative contributions, so adding one more
//! hypo or hyper event can never lower the resulting tier.

use crate::config::RiskConfig;
use crate::types::GlucoseReading;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Width of the assessment window.
const ASSESSMENT_WINDOW_DAYS: i64 = 7;

/// Coarse classification of short-term glycemic risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

/// Statistics and classification for one user's recent window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub user_id: i64,
    /// Evaluation instant; only readings at or before it are considered
    pub computed_at: DateTime<Utc>,
    /// Mean glucose over the window (mg/dL)
    pub mean_glucose_7d: f64,
    /// Sample standard deviation over the window (mg/dL)
    pub variability: f64,
    /// Readings below the hypoglycemia threshold
    pub hypo_event_count: usize,
    /// Readings above the hyperglycemia threshold
    pub hyper_event_count: usize,
    /// Least-squares slope of glucose against time (mg/dL per hour)
    pub trend_slope: f64,
    /// Raw additive risk score
    pub risk_score: f64,
    pub risk_tier: RiskTier,
}

/// Assess one user's risk from the 7 days of readings preceding `now`.
///
/// An empty window yields all-zero statistics and a low tier.
pub fn assess(
    user_id: i64,
    history: &[GlucoseReading],
    now: DateTime<Utc>,
    config: &RiskConfig,
) -> RiskAssessment {
    let window_start = now - Duration::days(ASSESSMENT_WINDOW_DAYS);
    let window: Vec<&GlucoseReading> = history
        .iter()
        .filter(|r| r.timestamp > window_start && r.timestamp <= now)
        .collect();

    if window.is_empty() {
        return RiskAssessment {
            user_id,
            computed_at: now,
            mean_glucose_7d: 0.0,
            variability: 0.0,
            hypo_event_count: 0,
            hyper_event_count: 0,
            trend_slope: 0.0,
            risk_score: 0.0,
            risk_tier: RiskTier::Low,
        };
    }

    let levels: Vec<f64> = window.iter().map(|r| r.glucose_level).collect();
    let mean_glucose_7d = levels.iter().mean();
    let variability = if levels.len() < 2 {
        0.0
    } else {
        levels.iter().std_dev()
    };

    let hypo_event_count = levels
        .iter()
        .filter(|&&level| level < config.hypo_threshold)
        .count();
    let hyper_event_count = levels
        .iter()
        .filter(|&&level| level > config.hyper_threshold)
        .count();

    let trend_slope = slope_per_hour(&window);

    let mut risk_score = hypo_event_count as f64 * config.hypo_event_weight
        + hyper_event_count as f64 * config.hyper_event_weight;
    if variability > config.variability_threshold {
        risk_score += config.variability_weight;
    }
    if trend_slope.abs() > config.trend_threshold {
        risk_score += config.trend_weight;
    }

    let risk_tier = if risk_score < config.medium_cutoff {
        RiskTier::Low
    } else if risk_score < config.high_cutoff {
        RiskTier::Medium
    } else {
        RiskTier::High
    };

    RiskAssessment {
        user_id,
        computed_at: now,
        mean_glucose_7d,
        variability,
        hypo_event_count,
        hyper_event_count,
        trend_slope,
        risk_score,
        risk_tier,
    }
}

/// Least-squares slope of glucose against hours since the first window
/// reading. Fewer than two points, or points at a single instant, give 0.
fn slope_per_hour(window: &[&GlucoseReading]) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }

    let origin = window[0].timestamp;
    let points: Vec<(f64, f64)> = window
        .iter()
        .map(|r| {
            let hours = (r.timestamp - origin).num_seconds() as f64 / 3600.0;
            (hours, r.glucose_level)
        })
        .collect();

    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_xx: f64 = points.iter().map(|(x, _)| x * x).sum();

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / denominator
}
