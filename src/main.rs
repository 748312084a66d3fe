//! Glucolens Engine CLI
//!
//! Serves the sync/prediction API, or runs the analytics pipeline offline
//! over a JSON file of readings.

use anyhow::Context;
use clap::{Parser, Subcommand};
use glucolens_engine::{
    server::{self, ServerConfig},
    EngineConfig, GlucoseEngine, GlucoseReading, VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "glucolens")]
#[command(version = VERSION)]
#[command(about = "Predictive glucose analytics engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP sync and prediction server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8000")]
        port: u16,
    },

    /// Train on a readings file and forecast the next hours for one user
    Forecast {
        /// JSON file containing an array of readings
        #[arg(long, short)]
        file: PathBuf,

        /// User to forecast for
        #[arg(long, short)]
        user: i64,

        /// Hours ahead to forecast
        #[arg(long, default_value = "6")]
        hours: u32,
    },

    /// Assess risk and print recommendations for one user
    Risk {
        /// JSON file containing an array of readings
        #[arg(long, short)]
        file: PathBuf,

        /// User to assess
        #[arg(long, short)]
        user: i64,
    },

    /// Show configuration
    Config {
        /// Write the current configuration to the config file for editing
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => cmd_serve(port).await,
        Commands::Forecast { file, user, hours } => cmd_forecast(&file, user, hours),
        Commands::Risk { file, user } => cmd_risk(&file, user),
        Commands::Config { init } => cmd_config(init),
    }
}

async fn cmd_serve(port: u16) -> anyhow::Result<()> {
    let config = EngineConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: could not load config, using defaults: {e}");
        EngineConfig::default()
    });

    let engine = Arc::new(GlucoseEngine::new(config));
    let (addr, shutdown_tx) = server::run(ServerConfig::new(port), engine).await?;

    println!("Glucolens Engine v{VERSION}");
    println!("Listening on http://{addr}");
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    println!();
    println!("Shutting down...");
    let _ = shutdown_tx.send(());

    Ok(())
}

fn cmd_forecast(file: &Path, user: i64, hours: u32) -> anyhow::Result<()> {
    let engine = offline_engine(file)?;

    let snapshot = engine.train().context("training failed")?;
    println!(
        "Trained snapshot {} on {} samples (r2 {:.3}, mae {:.1} mg/dL)",
        snapshot.version_id, snapshot.sample_count, snapshot.r2_score, snapshot.mae
    );
    println!();

    let points = engine.forecast(user, hours).context("forecast failed")?;
    if points.is_empty() {
        println!("Nothing to forecast (0 hours requested).");
        return Ok(());
    }

    println!("Forecast for user {user}:");
    for point in &points {
        println!(
            "  {}  {:>6.1} mg/dL  (confidence {:.2})",
            point.timestamp.format("%Y-%m-%d %H:%M"),
            point.predicted_glucose,
            point.confidence
        );
    }

    Ok(())
}

fn cmd_risk(file: &Path, user: i64) -> anyhow::Result<()> {
    let engine = offline_engine(file)?;

    let assessment = engine.assess(user);
    println!("Risk assessment for user {user}:");
    println!("  Tier: {:?}", assessment.risk_tier);
    println!("  7-day mean: {:.1} mg/dL", assessment.mean_glucose_7d);
    println!("  Variability: {:.1} mg/dL", assessment.variability);
    println!("  Hypo events: {}", assessment.hypo_event_count);
    println!("  Hyper events: {}", assessment.hyper_event_count);
    println!("  Trend: {:+.2} mg/dL per hour", assessment.trend_slope);

    let recommendations = engine.recommendations(user);
    if recommendations.is_empty() {
        println!();
        println!("No concerns detected.");
    } else {
        println!();
        println!("Recommendations:");
        for line in &recommendations {
            println!("  - {line}");
        }
    }

    Ok(())
}

fn cmd_config(init: bool) -> anyhow::Result<()> {
    let config = EngineConfig::load().unwrap_or_default();

    if init {
        config.save().context("could not write config file")?;
        println!("Wrote {:?}", EngineConfig::config_path());
        println!("Edit it to tune validation bounds and risk thresholds.");
        return Ok(());
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", EngineConfig::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );

    Ok(())
}

/// Build an engine preloaded from a readings file.
fn offline_engine(file: &Path) -> anyhow::Result<GlucoseEngine> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("could not read readings file {file:?}"))?;
    let readings: Vec<GlucoseReading> =
        serde_json::from_str(&content).context("readings file is not a JSON array of readings")?;

    let config = EngineConfig::load().unwrap_or_default();
    let engine = GlucoseEngine::new(config);

    let report = engine.ingest_initial(readings);
    println!(
        "Loaded {} readings ({} rejected)",
        report.succeeded(),
        report.rejected
    );
    for failure in &report.failures {
        eprintln!("  record {}: {}", failure.index, failure.reason);
    }

    Ok(engine)
}
