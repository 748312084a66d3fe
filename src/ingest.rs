//! Reading ingestion: validation, idempotent upsert, sync statistics.
//!
//! Batch operations report per-record outcomes instead of aborting on the
//! first bad record. Re-ingesting an identical reading is a successful
//! no-op; re-ingesting a different value for an existing key is a deliberate
//! correction and is counted and logged, never applied silently.

use crate::config::ValidationConfig;
use crate::error::EngineError;
use crate::store::{ReadingStore, UpsertOutcome};
use crate::types::GlucoseReading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Per-record failure inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFailure {
    /// Position of the offending record in the submitted batch
    pub index: usize,
    pub reason: String,
}

/// Outcome totals for a batch or bulk sync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub inserted: usize,
    pub duplicates: usize,
    pub corrected: usize,
    pub rejected: usize,
    pub failures: Vec<RecordFailure>,
}

impl BatchReport {
    /// Records that ended up stored (new or corrected) or already present.
    pub fn succeeded(&self) -> usize {
        self.inserted + self.duplicates + self.corrected
    }
}

/// Cumulative ingestion counters since startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestCounters {
    pub inserted: u64,
    pub duplicates: u64,
    pub corrected: u64,
    pub rejected: u64,
}

/// Validates and stores incoming readings.
pub struct Ingestor {
    store: Arc<dyn ReadingStore>,
    validation: ValidationConfig,
    inserted: AtomicU64,
    duplicates: AtomicU64,
    corrected: AtomicU64,
    rejected: AtomicU64,
    last_sync: RwLock<Option<DateTime<Utc>>>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn ReadingStore>, validation: ValidationConfig) -> Self {
        Self {
            store,
            validation,
            inserted: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            corrected: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            last_sync: RwLock::new(None),
        }
    }

    /// Ingest a single reading.
    pub fn ingest_one(&self, reading: GlucoseReading) -> Result<UpsertOutcome, EngineError> {
        let outcome = self.ingest_record(reading)?;
        self.mark_synced();
        Ok(outcome)
    }

    /// Ingest a batch of readings with partial-failure semantics.
    pub fn ingest_batch(&self, readings: Vec<GlucoseReading>) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, reading) in readings.into_iter().enumerate() {
            match self.ingest_record(reading) {
                Ok(UpsertOutcome::Inserted) => report.inserted += 1,
                Ok(UpsertOutcome::Duplicate) => report.duplicates += 1,
                Ok(UpsertOutcome::Corrected) => report.corrected += 1,
                Err(error) => {
                    report.rejected += 1;
                    report.failures.push(RecordFailure {
                        index,
                        reason: error.to_string(),
                    });
                }
            }
        }

        if report.succeeded() > 0 {
            self.mark_synced();
        }
        report
    }

    /// Bulk historical sync. Same semantics as a batch; only the expected
    /// volume differs, so the volume is logged.
    pub fn ingest_initial(&self, readings: Vec<GlucoseReading>) -> BatchReport {
        let submitted = readings.len();
        let report = self.ingest_batch(readings);
        tracing::info!(
            submitted,
            inserted = report.inserted,
            rejected = report.rejected,
            "initial bulk sync completed"
        );
        report
    }

    /// When the last successful sync happened.
    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read().expect("ingest lock poisoned")
    }

    /// Snapshot of the cumulative counters.
    pub fn counters(&self) -> IngestCounters {
        IngestCounters {
            inserted: self.inserted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            corrected: self.corrected.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    fn ingest_record(&self, reading: GlucoseReading) -> Result<UpsertOutcome, EngineError> {
        if let Err(error) = self.validate(&reading) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(error);
        }

        let outcome = self.store.append_or_update(reading);
        match outcome {
            UpsertOutcome::Inserted => {
                self.inserted.fetch_add(1, Ordering::Relaxed);
            }
            UpsertOutcome::Duplicate => {
                self.duplicates.fetch_add(1, Ordering::Relaxed);
            }
            UpsertOutcome::Corrected => {
                self.corrected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("existing reading overwritten with a different value");
            }
        }
        Ok(outcome)
    }

    fn validate(&self, reading: &GlucoseReading) -> Result<(), EngineError> {
        if !reading.glucose_level.is_finite()
            || reading.glucose_level < self.validation.min_glucose
            || reading.glucose_level > self.validation.max_glucose
        {
            return Err(EngineError::Validation(format!(
                "glucose level {} outside plausible range {}-{} mg/dL",
                reading.glucose_level, self.validation.min_glucose, self.validation.max_glucose
            )));
        }

        if reading.timestamp > Utc::now() {
            return Err(EngineError::Validation(format!(
                "timestamp {} is in the future",
                reading.timestamp
            )));
        }

        Ok(())
    }

    fn mark_synced(&self) {
        let mut last_sync = self.last_sync.write().expect("ingest lock poisoned");
        *last_sync = Some(Utc::now());
    }
}
