//! End-to-end tests for the analytics engine.

use chrono::{DateTime, Duration, Utc};
use glucolens_engine::{
    EngineConfig, EngineError, GlucoseEngine, GlucoseReading, InMemoryModelStore,
    InMemoryReadingStore, ModelStore, MomentOfDay, RiskTier, TrainingState,
};
use std::sync::Arc;

fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.training.tree_count = 20;
    config
}

/// Daily readings at 08:00, ending yesterday.
fn daily_readings(user_id: i64, levels: &[f64]) -> Vec<GlucoseReading> {
    let end = Utc::now() - Duration::days(1);
    let start = end - Duration::days(levels.len() as i64 - 1);
    levels
        .iter()
        .enumerate()
        .map(|(i, &level)| {
            GlucoseReading::new(
                user_id,
                level,
                start + Duration::days(i as i64),
                MomentOfDay::Fasting,
            )
        })
        .collect()
}

#[test]
fn test_end_to_end_daily_scenario() {
    let engine = GlucoseEngine::new(test_config());

    // The scenario user plus a second patient filling the training pool
    let user_levels = [90.0, 95.0, 100.0, 105.0, 110.0, 105.0, 100.0, 95.0, 90.0, 85.0];
    let user_readings = daily_readings(1, &user_levels);
    let last_known: DateTime<Utc> = user_readings.last().unwrap().timestamp;

    let report = engine.ingest_batch(user_readings);
    assert_eq!(report.inserted, 10);
    let report = engine.ingest_batch(daily_readings(
        2,
        &[120.0, 125.0, 130.0, 128.0, 126.0, 124.0, 122.0],
    ));
    assert_eq!(report.inserted, 7);

    engine.train().unwrap();
    assert_eq!(engine.training_state(), TrainingState::Idle);

    let points = engine.forecast(1, 3).unwrap();
    assert_eq!(points.len(), 3);
    for (i, point) in points.iter().enumerate() {
        assert_eq!(point.timestamp, last_known + Duration::hours(i as i64 + 1));
        assert!(
            (40.0..=400.0).contains(&point.predicted_glucose),
            "prediction {} outside plausible band",
            point.predicted_glucose
        );
    }
}

#[test]
fn test_unknown_user_assesses_low_and_cannot_forecast() {
    let engine = GlucoseEngine::new(test_config());
    engine.ingest_batch(daily_readings(
        1,
        &[90.0, 95.0, 100.0, 105.0, 110.0, 105.0, 100.0, 95.0, 90.0, 85.0, 95.0],
    ));
    engine.train().unwrap();

    let assessment = engine.assess(99);
    assert_eq!(assessment.hypo_event_count, 0);
    assert_eq!(assessment.hyper_event_count, 0);
    assert_eq!(assessment.risk_tier, RiskTier::Low);

    let err = engine.forecast(99, 6).unwrap_err();
    assert!(matches!(err, EngineError::InsufficientData(_)));
}

#[test]
fn test_insufficient_training_data_preserves_published_snapshot() {
    let readings = Arc::new(InMemoryReadingStore::new());
    let models = Arc::new(InMemoryModelStore::new());

    let engine = GlucoseEngine::with_stores(test_config(), readings.clone(), models.clone());
    engine.ingest_batch(daily_readings(
        1,
        &[90.0, 95.0, 100.0, 105.0, 110.0, 105.0, 100.0, 95.0, 90.0, 85.0, 95.0],
    ));
    let published = engine.train().unwrap();
    assert_eq!(
        models.load_current().unwrap().version_id,
        published.version_id
    );

    // Same stores, but a threshold no history can meet
    let mut strict = test_config();
    strict.training.min_training_samples = 10_000;
    let strict_engine = GlucoseEngine::with_stores(strict, readings, models.clone());

    let err = strict_engine.train().unwrap_err();
    assert!(matches!(err, EngineError::InsufficientData(_)));
    assert_eq!(strict_engine.training_state(), TrainingState::Failed);

    // The previously published snapshot is untouched
    assert_eq!(
        models.load_current().unwrap().version_id,
        published.version_id
    );
}

#[test]
fn test_ingest_is_idempotent_per_key() {
    let engine = GlucoseEngine::new(test_config());
    let reading = GlucoseReading::new(
        1,
        104.0,
        Utc::now() - Duration::hours(5),
        MomentOfDay::AfterLunch,
    );

    engine.ingest_one(reading.clone()).unwrap();
    engine.ingest_one(reading).unwrap();

    assert_eq!(engine.status().total_readings, 1);
    assert_eq!(engine.reading_count(1), 1);
}

#[test]
fn test_batch_with_bad_record_keeps_the_rest() {
    let engine = GlucoseEngine::new(test_config());
    let mut batch = daily_readings(1, &[100.0, 105.0, 110.0]);
    batch[1].glucose_level = 1200.0;

    let report = engine.ingest_batch(batch);

    assert_eq!(report.inserted, 2);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.failures[0].index, 1);
    assert_eq!(engine.status().total_readings, 2);
}

#[test]
fn test_risk_tier_never_drops_with_an_extra_event() {
    let engine_base = GlucoseEngine::new(test_config());
    let engine_more = GlucoseEngine::new(test_config());
    let now = Utc::now();

    let base = vec![
        GlucoseReading::new(1, 65.0, now - Duration::hours(40), MomentOfDay::Fasting),
        GlucoseReading::new(1, 100.0, now - Duration::hours(30), MomentOfDay::AfterLunch),
        GlucoseReading::new(1, 185.0, now - Duration::hours(20), MomentOfDay::AfterDinner),
    ];
    let mut more = base.clone();
    more.push(GlucoseReading::new(
        1,
        60.0,
        now - Duration::hours(10),
        MomentOfDay::Fasting,
    ));

    assert_eq!(engine_base.ingest_batch(base).rejected, 0);
    assert_eq!(engine_more.ingest_batch(more).rejected, 0);

    let a = engine_base.assess_at(1, now);
    let b = engine_more.assess_at(1, now);

    assert!(b.risk_score > a.risk_score);
    assert!(b.risk_tier >= a.risk_tier);
}

#[test]
fn test_corrected_resync_overwrites_explicitly() {
    let engine = GlucoseEngine::new(test_config());
    let ts = Utc::now() - Duration::hours(3);
    let original = GlucoseReading::new(1, 118.0, ts, MomentOfDay::AfterDinner);
    let mut corrected = original.clone();
    corrected.glucose_level = 128.0;

    engine.ingest_one(original).unwrap();
    engine.ingest_one(corrected).unwrap();

    let status = engine.status();
    assert_eq!(status.total_readings, 1);
    assert_eq!(status.counters.corrected, 1);
}
