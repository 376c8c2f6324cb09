//! `registrar-worker` -- runs one batch import from JSON files.
//!
//! Reads the job description from the environment (see
//! [`WorkerConfig::from_env`]), runs it to a terminal state, and prints
//! the `ImportResult` as JSON on stdout.
//!
//! Exit codes: `0` completed, `1` configuration or I/O error, `2` the job
//! failed or was cancelled.

use registrar_worker::{LogFormat, WorkerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let json = LogFormat::from_env() == LogFormat::Json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "registrar_worker=info,registrar_pipeline=info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    let config = WorkerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %format!("{e:#}"), "Invalid worker configuration");
        std::process::exit(1);
    });

    let result = registrar_worker::run(config).await.unwrap_or_else(|e| {
        tracing::error!(error = %format!("{e:#}"), "Import could not be started");
        std::process::exit(1);
    });

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "Failed to serialize import result"),
    }

    if !result.success {
        std::process::exit(2);
    }
}
