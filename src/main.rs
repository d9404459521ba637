//! Fraud Detector - Main Entry Point
//!
//! Consumes transactions from NATS, scores them against an isolation-forest
//! artifact and emits one audit record per decision.

use std::process::ExitCode;

use fraud_detector::{app, config::AppConfig, telemetry};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    // Logging is configured from the config file, so failures before that go to stderr.
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fraud-detector: invalid configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let logger = match telemetry::init(&config.logging) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("fraud-detector: failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match app::run(config, Some(logger)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = format!("{e:#}"), "Fatal error, exiting");
            ExitCode::FAILURE
        }
    }
}
