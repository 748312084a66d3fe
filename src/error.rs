//! Error taxonomy for the analytics engine.
//!
//! All failures are deterministic given the same input; the engine never
//! retries on its own. A duplicate re-ingest is a successful no-op outcome,
//! not an error (see `store::UpsertOutcome`).

/// Engine error kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Malformed or out-of-range reading, or an out-of-range request
    Validation(String),
    /// Not enough history to build features, train, or predict
    InsufficientData(String),
    /// A forecast was requested before any successful training
    ModelNotTrained,
    /// Fit or evaluation failed; the previous snapshot stays published
    TrainingFailed(String),
    /// A training run is already active
    TrainingInProgress,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "validation error: {msg}"),
            EngineError::InsufficientData(msg) => write!(f, "insufficient data: {msg}"),
            EngineError::ModelNotTrained => {
                write!(f, "no trained model available; trigger training first")
            }
            EngineError::TrainingFailed(msg) => write!(f, "training failed: {msg}"),
            EngineError::TrainingInProgress => write!(f, "a training run is already in progress"),
        }
    }
}

impl std::error::Error for EngineError {}
