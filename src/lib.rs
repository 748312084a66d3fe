//! Glucolens Engine - predictive glucose analytics for diabetic patients.
//!
//! This library forecasts future blood-glucose values from a time-ordered
//! history of readings, classifies short-term glycemic risk, and derives
//! rule-based recommendations. Readings arrive through an idempotent sync
//! surface; a bagged ensemble of regression trees is trained on demand and
//! published as an immutable, versioned snapshot.
//!
//! # Guarantees
//!
//! - **No temporal leakage**: features for an instant only see readings
//!   strictly before it
//! - **Atomic model publication**: concurrent forecasts see the old snapshot
//!   in full or the new one in full, never a partial fit
//! - **Idempotent ingestion**: re-syncing an identical reading is a no-op;
//!   conflicting re-syncs are explicit corrections, never silent
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Glucolens Engine                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Ingestor  │──▶│   Reading   │──▶│  Features   │       │
//! │  │ (validate)  │   │    Store    │   │ (compute)   │       │
//! │  └─────────────┘   └─────────────┘   └──────┬──────┘       │
//! │                                             │               │
//! │                    ┌─────────────┐   ┌──────▼──────┐       │
//! │                    │    Risk /   │   │   Trainer   │       │
//! │                    │  Recommend  │   │  Predictor  │       │
//! │                    └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use glucolens_engine::{EngineConfig, GlucoseEngine};
//!
//! let engine = GlucoseEngine::new(EngineConfig::default());
//!
//! // Sync readings, train, then forecast the next six hours
//! // engine.ingest_batch(readings);
//! let snapshot = engine.train().expect("not enough history yet");
//! let forecast = engine.forecast(1, 6).expect("forecast failed");
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod server;
pub mod store;
pub mod types;

// Re-export key types at crate root for convenience
pub use config::{EngineConfig, ForecastConfig, RiskConfig, TrainingConfig, ValidationConfig};
pub use core::{
    assess, forecast, recommend, train, FeatureVector, ForecastPoint, ModelSnapshot,
    RiskAssessment, RiskTier,
};
pub use engine::{GlucoseEngine, ModelInfo, SyncStatus, TrainingState};
pub use error::EngineError;
pub use ingest::{BatchReport, IngestCounters, RecordFailure};
pub use store::{
    InMemoryModelStore, InMemoryReadingStore, ModelStore, ReadingStore, UpsertOutcome,
};
pub use types::{GlucoseReading, MomentOfDay};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
