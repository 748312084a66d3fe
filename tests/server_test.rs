//! Integration tests for the sync and prediction HTTP server.

use chrono::{DateTime, Duration, Utc};
use glucolens_engine::{
    server::{run, ServerConfig},
    EngineConfig, GlucoseEngine,
};
use std::net::SocketAddr;
use std::sync::Arc;

async fn start_server() -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let mut config = EngineConfig::default();
    config.training.tree_count = 15;

    let engine = Arc::new(GlucoseEngine::new(config));
    run(ServerConfig::new(0), engine)
        .await
        .expect("Failed to start server")
}

fn daily_readings_json(user_id: i64, levels: &[f64]) -> Vec<serde_json::Value> {
    let end = Utc::now() - Duration::days(1);
    let start = end - Duration::days(levels.len() as i64 - 1);
    levels
        .iter()
        .enumerate()
        .map(|(i, &level)| {
            serde_json::json!({
                "user_id": user_id,
                "glucose_level": level,
                "timestamp": (start + Duration::days(i as i64)).to_rfc3339(),
                "moment_of_day": "fasting",
            })
        })
        .collect()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (addr, shutdown_tx) = start_server().await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert!(body["version"].as_str().is_some());
    assert_eq!(body["model_loaded"], false);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_sync_reading_duplicate_semantics() {
    let (addr, shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();

    let reading = serde_json::json!({
        "user_id": 1,
        "glucose_level": 112.0,
        "timestamp": (Utc::now() - Duration::hours(2)).to_rfc3339(),
        "moment_of_day": "after_lunch",
    });

    let first: serde_json::Value = client
        .post(format!("http://{}/sync/reading", addr))
        .json(&reading)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(first["outcome"], "inserted");

    let second: serde_json::Value = client
        .post(format!("http://{}/sync/reading", addr))
        .json(&reading)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(second["outcome"], "duplicate");

    let status: serde_json::Value = client
        .get(format!("http://{}/sync/status", addr))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(status["total_readings"], 1);
    assert_eq!(status["training_state"], "idle");

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_invalid_reading_is_rejected() {
    let (addr, shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();

    let reading = serde_json::json!({
        "user_id": 1,
        "glucose_level": 1500.0,
        "timestamp": (Utc::now() - Duration::hours(1)).to_rfc3339(),
        "moment_of_day": "fasting",
    });

    let response = client
        .post(format!("http://{}/sync/reading", addr))
        .json(&reading)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_forecast_before_training_conflicts() {
    let (addr, shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{}/predictions/next-hours", addr))
        .json(&serde_json::json!({"user_id": 1, "hours_ahead": 3}))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["code"], "MODEL_NOT_TRAINED");

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_initial_sync_train_and_forecast_flow() {
    let (addr, shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();

    // Bulk-load two weeks of readings
    let readings = daily_readings_json(
        1,
        &[
            90.0, 95.0, 100.0, 105.0, 110.0, 105.0, 100.0, 95.0, 90.0, 85.0, 95.0, 105.0, 100.0,
            98.0,
        ],
    );
    let report: serde_json::Value = client
        .post(format!("http://{}/sync/initial", addr))
        .json(&serde_json::json!({ "readings": readings }))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(report["inserted"], 14);
    assert_eq!(report["rejected"], 0);

    // Trigger background training
    let response = client
        .post(format!("http://{}/sync/train-model", addr))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

    // Poll the status view until the run resolves
    let mut model_ready = false;
    for _ in 0..100 {
        let status: serde_json::Value = client
            .get(format!("http://{}/sync/status", addr))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse JSON");

        if status["training_state"] == "idle" && !status["current_model"].is_null() {
            model_ready = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    assert!(model_ready, "training did not complete in time");

    // Forecast the next three hours
    let body: serde_json::Value = client
        .post(format!("http://{}/predictions/next-hours", addr))
        .json(&serde_json::json!({"user_id": 1, "hours_ahead": 3}))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");

    let predictions = body["predictions"].as_array().expect("missing predictions");
    assert_eq!(predictions.len(), 3);
    assert!(body["model_version"].as_str().is_some());

    let timestamps: Vec<DateTime<Utc>> = predictions
        .iter()
        .map(|p| {
            p["timestamp"]
                .as_str()
                .expect("missing timestamp")
                .parse()
                .expect("bad timestamp")
        })
        .collect();
    for pair in timestamps.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::hours(1));
    }

    // Risk assessment and recommendations are served from the same history
    let risk: serde_json::Value = client
        .post(format!("http://{}/predictions/risk-assessment", addr))
        .json(&serde_json::json!({"user_id": 1}))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(risk["assessment"]["user_id"], 1);

    let recs: serde_json::Value = client
        .get(format!("http://{}/predictions/recommendations/1", addr))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(recs["based_on_readings"], 14);

    let _ = shutdown_tx.send(());
}
