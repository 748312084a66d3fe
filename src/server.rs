//! HTTP server exposing the sync and prediction operations.
//!
//! The enterprise application pushes readings here; clients pull forecasts,
//! risk assessments and recommendations. This layer only translates
//! requests into engine calls and maps error kinds to status codes.
//!
//! # Architecture
//!
//! ```text
//! Patient app ──→ POST /sync/* ──→ GlucoseEngine ──→ reading store
//! Dashboard  ──→ POST /predictions/* ──→ GlucoseEngine ──→ model snapshot
//! ```

use crate::core::predictor::ForecastPoint;
use crate::core::risk::RiskAssessment;
use crate::engine::{GlucoseEngine, SyncStatus};
use crate::error::EngineError;
use crate::ingest::BatchReport;
use crate::store::UpsertOutcome;
use crate::types::GlucoseReading;
use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use uuid::Uuid;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Origins allowed by the CORS layer
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            allowed_origins: vec![
                "http://localhost:8080".to_string(),
                "http://localhost:3000".to_string(),
            ],
        }
    }
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
}

/// Error response.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Acknowledgement for a single-reading sync.
#[derive(Serialize)]
pub struct SyncAck {
    pub outcome: UpsertOutcome,
}

/// Body for batch and initial sync.
#[derive(Deserialize)]
pub struct SyncBatchRequest {
    pub readings: Vec<GlucoseReading>,
}

/// Body for a forecast request.
#[derive(Deserialize)]
pub struct ForecastRequest {
    pub user_id: i64,
    pub hours_ahead: u32,
}

/// Forecast response with model provenance.
#[derive(Serialize)]
pub struct ForecastResponse {
    pub user_id: i64,
    pub model_version: Uuid,
    pub generated_at: DateTime<Utc>,
    pub predictions: Vec<ForecastPoint>,
}

/// Body for a risk assessment request.
#[derive(Deserialize)]
pub struct RiskRequest {
    pub user_id: i64,
}

/// Assessment plus derived advice.
#[derive(Serialize)]
pub struct RiskResponse {
    pub assessment: RiskAssessment,
    pub recommendations: Vec<String>,
}

/// Recommendations for one user.
#[derive(Serialize)]
pub struct RecommendationResponse {
    pub user_id: i64,
    pub recommendations: Vec<String>,
    pub based_on_readings: usize,
    pub generated_at: DateTime<Utc>,
}

/// Acknowledgement for a training trigger.
#[derive(Serialize)]
pub struct TrainAck {
    pub status: String,
}

fn error_response(error: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match &error {
        EngineError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        EngineError::InsufficientData(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_DATA")
        }
        EngineError::ModelNotTrained => (StatusCode::CONFLICT, "MODEL_NOT_TRAINED"),
        EngineError::TrainingInProgress => (StatusCode::CONFLICT, "TRAINING_IN_PROGRESS"),
        EngineError::TrainingFailed(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "TRAINING_FAILED")
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
        }),
    )
}

/// GET /health
async fn health(State(engine): State<Arc<GlucoseEngine>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: engine.current_model().is_some(),
    })
}

/// POST /sync/reading
async fn sync_reading(
    State(engine): State<Arc<GlucoseEngine>>,
    Json(reading): Json<GlucoseReading>,
) -> Result<Json<SyncAck>, (StatusCode, Json<ErrorResponse>)> {
    let outcome = engine.ingest_one(reading).map_err(error_response)?;
    Ok(Json(SyncAck { outcome }))
}

/// POST /sync/batch
async fn sync_batch(
    State(engine): State<Arc<GlucoseEngine>>,
    Json(request): Json<SyncBatchRequest>,
) -> Json<BatchReport> {
    Json(engine.ingest_batch(request.readings))
}

/// POST /sync/initial
async fn sync_initial(
    State(engine): State<Arc<GlucoseEngine>>,
    Json(request): Json<SyncBatchRequest>,
) -> Json<BatchReport> {
    Json(engine.ingest_initial(request.readings))
}

/// GET /sync/status
async fn sync_status(State(engine): State<Arc<GlucoseEngine>>) -> Json<SyncStatus> {
    Json(engine.status())
}

/// POST /sync/train-model
///
/// Training is long-running; the trigger returns immediately and the
/// outcome is visible through the status view.
async fn train_model(
    State(engine): State<Arc<GlucoseEngine>>,
) -> Result<(StatusCode, Json<TrainAck>), (StatusCode, Json<ErrorResponse>)> {
    engine.spawn_training().map_err(error_response)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(TrainAck {
            status: "training_started".to_string(),
        }),
    ))
}

/// POST /predictions/next-hours
async fn predict_next_hours(
    State(engine): State<Arc<GlucoseEngine>>,
    Json(request): Json<ForecastRequest>,
) -> Result<Json<ForecastResponse>, (StatusCode, Json<ErrorResponse>)> {
    let snapshot = engine
        .current_model()
        .ok_or_else(|| error_response(EngineError::ModelNotTrained))?;
    let predictions = engine
        .forecast(request.user_id, request.hours_ahead)
        .map_err(error_response)?;

    Ok(Json(ForecastResponse {
        user_id: request.user_id,
        model_version: snapshot.version_id,
        generated_at: Utc::now(),
        predictions,
    }))
}

/// POST /predictions/risk-assessment
async fn risk_assessment(
    State(engine): State<Arc<GlucoseEngine>>,
    Json(request): Json<RiskRequest>,
) -> Json<RiskResponse> {
    let assessment = engine.assess(request.user_id);
    let recommendations = engine.recommendations(request.user_id);
    Json(RiskResponse {
        assessment,
        recommendations,
    })
}

/// GET /predictions/recommendations/{user_id}
async fn recommendations(
    State(engine): State<Arc<GlucoseEngine>>,
    Path(user_id): Path<i64>,
) -> Json<RecommendationResponse> {
    Json(RecommendationResponse {
        user_id,
        recommendations: engine.recommendations(user_id),
        based_on_readings: engine.reading_count(user_id),
        generated_at: Utc::now(),
    })
}

/// Run the HTTP server.
pub async fn run(
    config: ServerConfig,
    engine: Arc<GlucoseEngine>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "skipping unparseable CORS origin");
                None
            }
        })
        .collect();

    let app = Router::new()
        .route("/health", get(health))
        .route("/sync/reading", post(sync_reading))
        .route("/sync/batch", post(sync_batch))
        .route("/sync/initial", post(sync_initial))
        .route("/sync/status", get(sync_status))
        .route("/sync/train-model", post(train_model))
        .route("/predictions/next-hours", post(predict_next_hours))
        .route("/predictions/risk-assessment", post(risk_assessment))
        .route("/predictions/recommendations/:user_id", get(recommendations))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(engine);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("glucose engine listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("server shutdown signal received");
            })
            .await
        {
            tracing::error!("server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
