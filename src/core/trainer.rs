//! Model training and snapshot construction.
//!
//! Training pairs every reading (except each user's first) with features
//! computed from the strictly earlier readings, so the label never leaks
//! into its own inputs. All users feed one global model. The evaluation
//! partition is chronological per user: the last fifth of each user's pairs
//! is held out, which avoids the leakage a shuffled split would introduce.

use crate::config::TrainingConfig;
use crate::core::features::{self, FEATURE_NAMES};
use crate::core::forest::{BaggedForest, ForestParams};
use crate::error::EngineError;
use crate::types::GlucoseReading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// An immutable, versioned bundle of fitted model state plus training
/// metadata. Created here, published by the model store's slot swap, and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Unique id of this training run
    pub version_id: Uuid,
    /// When the fit completed
    pub trained_at: DateTime<Utc>,
    /// Total (feature, target) pairs used across train and evaluation
    pub sample_count: usize,
    /// Ordered names of the model's input features
    pub feature_names: Vec<String>,
    /// Fitted ensemble state
    pub forest: BaggedForest,
    /// Coefficient of determination on the held-out partition
    pub r2_score: f64,
    /// Mean absolute error on the held-out partition (mg/dL)
    pub mae: f64,
}

/// Train a new snapshot over every user's history.
///
/// Fails with `InsufficientData` when fewer than
/// `config.min_training_samples` usable pairs exist. Nothing is published
/// here; a failed fit leaves whatever snapshot is current untouched.
pub fn train(
    histories: &BTreeMap<i64, Vec<GlucoseReading>>,
    config: &TrainingConfig,
) -> Result<ModelSnapshot, EngineError> {
    let mut train_xs: Vec<Vec<f64>> = Vec::new();
    let mut train_ys: Vec<f64> = Vec::new();
    let mut eval_xs: Vec<Vec<f64>> = Vec::new();
    let mut eval_ys: Vec<f64> = Vec::new();
    let mut total_pairs = 0usize;

    for history in histories.values() {
        if history.len() < 2 {
            continue;
        }

        let mut xs: Vec<Vec<f64>> = Vec::with_capacity(history.len() - 1);
        let mut ys: Vec<f64> = Vec::with_capacity(history.len() - 1);
        for i in 1..history.len() {
            let vector = features::build(&history[..i], history[i].timestamp);
            xs.push(vector.to_array().to_vec());
            ys.push(history[i].glucose_level);
        }

        total_pairs += xs.len();

        // Hold out the chronological tail of this user's pairs
        let holdout = if xs.len() >= 2 {
            (xs.len() / config.holdout_denominator.max(2)).max(1)
        } else {
            0
        };
        let split = xs.len() - holdout;

        eval_xs.extend(xs.split_off(split));
        eval_ys.extend(ys.split_off(split));
        train_xs.extend(xs);
        train_ys.extend(ys);
    }

    if total_pairs < config.min_training_samples {
        return Err(EngineError::InsufficientData(format!(
            "need at least {} training pairs, got {}",
            config.min_training_samples, total_pairs
        )));
    }

    let params = ForestParams {
        tree_count: config.tree_count,
        max_depth: config.max_depth,
        min_samples_leaf: config.min_samples_leaf,
        seed: config.seed,
    };
    let forest = BaggedForest::fit(&train_xs, &train_ys, &params);

    let (r2_score, mae) = if eval_xs.is_empty() {
        tracing::warn!("no holdout pairs available; evaluating on the training partition");
        evaluate(&forest, &train_xs, &train_ys)
    } else {
        evaluate(&forest, &eval_xs, &eval_ys)
    };

    if !r2_score.is_finite() || !mae.is_finite() {
        return Err(EngineError::TrainingFailed(format!(
            "evaluation produced non-finite metrics (r2 {r2_score}, mae {mae})"
        )));
    }

    let snapshot = ModelSnapshot {
        version_id: Uuid::new_v4(),
        trained_at: Utc::now(),
        sample_count: total_pairs,
        feature_names: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
        forest,
        r2_score,
        mae,
    };

    tracing::info!(
        version = %snapshot.version_id,
        samples = snapshot.sample_count,
        r2 = snapshot.r2_score,
        mae = snapshot.mae,
        "trained new model snapshot"
    );

    Ok(snapshot)
}

/// Compute (R², MAE) for the forest over an evaluation set.
fn evaluate(forest: &BaggedForest, xs: &[Vec<f64>], ys: &[f64]) -> (f64, f64) {
    let predictions: Vec<f64> = xs.iter().map(|x| forest.predict(x)).collect();

    let mae = predictions
        .iter()
        .zip(ys)
        .map(|(p, y)| (p - y).abs())
        .sum::<f64>()
        / ys.len() as f64;

    let mean = ys.iter().sum::<f64>() / ys.len() as f64;
    let ss_total: f64 = ys.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_residual: f64 = predictions
        .iter()
        .zip(ys)
        .map(|(p, y)| (y - p).powi(2))
        .sum();

    let r2 = if ss_total == 0.0 {
        0.0
    } else {
        1.0 - ss_residual / ss_total
    };

    (r2, mae)
}
