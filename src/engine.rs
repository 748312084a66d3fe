//! Engine facade wiring ingestion, training, forecasting and risk together.
//!
//! Training follows an explicit state machine: `Idle -> Training -> Idle` on
//! success, `Idle -> Training -> Failed` on failure. `Failed` is an idle
//! state that records the last outcome; retraining is allowed from it. A
//! snapshot is only published after fit and evaluation complete, so
//! concurrent forecasts see either the old model in full or the new one in
//! full.

use crate::config::EngineConfig;
use crate::core::predictor::ForecastPoint;
use crate::core::risk::RiskAssessment;
use crate::core::trainer::ModelSnapshot;
use crate::core::{predictor, recommend, risk, trainer};
use crate::error::EngineError;
use crate::ingest::{BatchReport, IngestCounters, Ingestor};
use crate::store::{
    InMemoryModelStore, InMemoryReadingStore, ModelStore, ReadingStore, UpsertOutcome,
};
use crate::types::GlucoseReading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Current position in the training state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingState {
    Idle,
    Training,
    Failed,
}

const STATE_IDLE: u8 = 0;
const STATE_TRAINING: u8 = 1;
const STATE_FAILED: u8 = 2;

/// Metadata of the currently published model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub version_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub sample_count: usize,
    pub r2_score: f64,
    pub mae: f64,
}

impl From<&ModelSnapshot> for ModelInfo {
    fn from(snapshot: &ModelSnapshot) -> Self {
        Self {
            version_id: snapshot.version_id,
            trained_at: snapshot.trained_at,
            sample_count: snapshot.sample_count,
            r2_score: snapshot.r2_score,
            mae: snapshot.mae,
        }
    }
}

/// Status view over ingestion and training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub last_sync_at: Option<DateTime<Utc>>,
    pub total_readings: usize,
    pub training_state: TrainingState,
    pub counters: IngestCounters,
    pub current_model: Option<ModelInfo>,
}

/// The analytics engine. Cheap to share behind an `Arc`; every operation
/// takes `&self`.
pub struct GlucoseEngine {
    config: EngineConfig,
    readings: Arc<dyn ReadingStore>,
    models: Arc<dyn ModelStore>,
    ingestor: Ingestor,
    training_state: AtomicU8,
}

impl GlucoseEngine {
    /// Engine over fresh in-memory stores.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_stores(
            config,
            Arc::new(InMemoryReadingStore::new()),
            Arc::new(InMemoryModelStore::new()),
        )
    }

    /// Engine over injected stores.
    pub fn with_stores(
        config: EngineConfig,
        readings: Arc<dyn ReadingStore>,
        models: Arc<dyn ModelStore>,
    ) -> Self {
        let ingestor = Ingestor::new(readings.clone(), config.validation.clone());
        Self {
            config,
            readings,
            models,
            ingestor,
            training_state: AtomicU8::new(STATE_IDLE),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ingest_one(&self, reading: GlucoseReading) -> Result<UpsertOutcome, EngineError> {
        self.ingestor.ingest_one(reading)
    }

    pub fn ingest_batch(&self, readings: Vec<GlucoseReading>) -> BatchReport {
        self.ingestor.ingest_batch(readings)
    }

    pub fn ingest_initial(&self, readings: Vec<GlucoseReading>) -> BatchReport {
        self.ingestor.ingest_initial(readings)
    }

    /// Sync and training status view.
    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            last_sync_at: self.ingestor.last_sync_at(),
            total_readings: self.readings.total_readings(),
            training_state: self.training_state(),
            counters: self.ingestor.counters(),
            current_model: self.models.load_current().map(|s| ModelInfo::from(&*s)),
        }
    }

    pub fn training_state(&self) -> TrainingState {
        match self.training_state.load(Ordering::SeqCst) {
            STATE_TRAINING => TrainingState::Training,
            STATE_FAILED => TrainingState::Failed,
            _ => TrainingState::Idle,
        }
    }

    /// The currently published snapshot, if any.
    pub fn current_model(&self) -> Option<Arc<ModelSnapshot>> {
        self.models.load_current()
    }

    /// Train synchronously and publish on success.
    pub fn train(&self) -> Result<Arc<ModelSnapshot>, EngineError> {
        self.begin_training()?;
        self.run_training()
    }

    /// Train on a background thread; the trigger returns immediately.
    /// Progress and outcome are visible through [`GlucoseEngine::status`].
    pub fn spawn_training(self: &Arc<Self>) -> Result<(), EngineError> {
        self.begin_training()?;
        let engine = Arc::clone(self);
        std::thread::spawn(move || {
            // Outcome is recorded in the state machine and logged
            let _ = engine.run_training();
        });
        Ok(())
    }

    /// Forecast hourly glucose levels for one user.
    pub fn forecast(
        &self,
        user_id: i64,
        hours_ahead: u32,
    ) -> Result<Vec<ForecastPoint>, EngineError> {
        let snapshot = self
            .models
            .load_current()
            .ok_or(EngineError::ModelNotTrained)?;
        let history = self.readings.history_for(user_id);
        predictor::forecast(&snapshot, &history, hours_ahead, &self.config.forecast)
    }

    /// Assess one user's current risk.
    pub fn assess(&self, user_id: i64) -> RiskAssessment {
        self.assess_at(user_id, Utc::now())
    }

    /// Assess risk as of an explicit instant.
    pub fn assess_at(&self, user_id: i64, now: DateTime<Utc>) -> RiskAssessment {
        let history = self.readings.history_for(user_id);
        risk::assess(user_id, &history, now, &self.config.risk)
    }

    /// Advisory text for one user's current assessment.
    pub fn recommendations(&self, user_id: i64) -> Vec<String> {
        let assessment = self.assess(user_id);
        recommend::recommend(&assessment, &self.config.risk)
    }

    /// Stored readings for one user.
    pub fn reading_count(&self, user_id: i64) -> usize {
        self.readings.history_for(user_id).len()
    }

    /// Claim the training slot. Allowed from `Idle` and `Failed`; a second
    /// trigger while a run is active is rejected.
    fn begin_training(&self) -> Result<(), EngineError> {
        for from in [STATE_IDLE, STATE_FAILED] {
            if self
                .training_state
                .compare_exchange(from, STATE_TRAINING, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(());
            }
        }
        Err(EngineError::TrainingInProgress)
    }

    /// Run a claimed training run and resolve the state machine.
    fn run_training(&self) -> Result<Arc<ModelSnapshot>, EngineError> {
        let histories = self.readings.all_histories();
        match trainer::train(&histories, &self.config.training) {
            Ok(snapshot) => {
                let published = self.models.publish(snapshot);
                self.training_state.store(STATE_IDLE, Ordering::SeqCst);
                Ok(published)
            }
            Err(error) => {
                self.training_state.store(STATE_FAILED, Ordering::SeqCst);
                tracing::error!(%error, "training failed; previous snapshot remains current");
                Err(error)
            }
        }
    }
}
