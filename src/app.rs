//! Process wiring: model, transport, sink and consumer loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn, Dispatch};

use crate::config::{AppConfig, ModelConfig, SinkKind};
use crate::consumer::TransactionConsumer;
use crate::error::ModelError;
use crate::feature_extractor::{FeatureExtractor, FEATURE_NAMES};
use crate::metrics::{MetricsReporter, PipelineMetrics};
use crate::models::{AnomalyModel, LoadedModel, ModelLoader};
use crate::pipeline::Pipeline;
use crate::scorer::Scorer;
use crate::sink::{LogSink, NatsAlertSink, Sink};

/// Load the artifact and settle the label convention it is read with.
///
/// The convention stored in the artifact is the one it was fitted under and
/// wins over configuration.
pub fn prepare_model(config: &ModelConfig) -> Result<(Arc<LoadedModel>, Scorer), ModelError> {
    let model = ModelLoader::with_threads(config.onnx_threads).load(&config.path)?;
    model.check_features(FEATURE_NAMES)?;

    let convention = match model.convention() {
        Some(recorded) => {
            if recorded != config.convention() {
                warn!(
                    artifact = ?recorded,
                    configured = ?config.convention(),
                    "Artifact label convention differs from configuration, using the artifact's"
                );
            }
            recorded
        }
        None => config.convention(),
    };

    Ok((Arc::new(model), Scorer::new(convention)))
}

/// Run the detector until Ctrl-C or a fatal error.
///
/// The model is loaded before any connection is attempted, so a missing
/// artifact fails fast.
pub async fn run(config: AppConfig, logger: Option<Dispatch>) -> Result<()> {
    info!("Starting fraud detector");

    let (model, scorer) = prepare_model(&config.model)
        .with_context(|| format!("Cannot start without model {}", config.model.path.display()))?;
    info!(
        model = model.name(),
        features = FeatureExtractor::new().feature_count(),
        convention = ?scorer.convention(),
        "Model ready"
    );

    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = TransactionConsumer::new(
        client.clone(),
        &config.nats.transaction_subject,
        &config.nats.queue_group,
    );
    let sink = match config.alerts.sink {
        SinkKind::Log => Sink::Log(LogSink),
        SinkKind::Nats => {
            info!("Publishing alerts to: {}", config.nats.alert_subject);
            Sink::Nats(NatsAlertSink::new(client.clone(), &config.nats.alert_subject))
        }
    };

    let metrics = Arc::new(PipelineMetrics::new());
    let reporter = (config.pipeline.metrics_interval_secs > 0).then(|| {
        let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
        tokio::spawn(reporter.start())
    });

    let mut pipeline = Pipeline::new(model, scorer, sink).with_metrics(metrics.clone());
    if let Some(logger) = logger {
        pipeline = pipeline.with_logger(logger);
    }

    let messages = consumer.payloads().await?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C, running until the transport closes");
            std::future::pending::<()>().await;
        }
    };

    let result = pipeline.run(messages, shutdown).await;

    if let Some(reporter) = reporter {
        reporter.abort();
    }
    info!("Detector shutting down...");
    metrics.print_summary();
    if let Err(e) = client.flush().await {
        warn!(error = %e, "Failed to flush pending alerts");
    }

    result?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::FeatureVector;
    use crate::models::{ForestArtifact, ForestParams, IsolationForest};
    use crate::scorer::LabelConvention;

    #[test]
    fn test_prepare_model_prefers_artifact_convention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fraud_model.json");
        let data: Vec<FeatureVector> = (0..100)
            .map(|i| FeatureVector::new(vec![45.0 + (i % 10) as f64]))
            .collect();
        let forest = IsolationForest::fit(&data, &ForestParams::default()).unwrap();
        ModelLoader::new()
            .save_forest(&path, &ForestArtifact::new(forest, "t"))
            .unwrap();

        let config = ModelConfig {
            path,
            inlier_label: 0,
            outlier_label: 1,
            onnx_threads: 1,
        };
        let (_, scorer) = prepare_model(&config).unwrap();
        assert_eq!(scorer.convention(), LabelConvention::ISOLATION_FOREST);
    }
}
