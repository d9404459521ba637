//! Reference Model Trainer
//!
//! Fits the isolation forest on the synthetic reference dataset and writes the
//! JSON artifact the detector loads at startup.
//!
//! Usage: train_model [OUTPUT_PATH] [SEED]

use anyhow::{Context, Result};
use fraud_detector::feature_extractor::FeatureVector;
use fraud_detector::models::training::fit_reference_model;
use fraud_detector::models::{AnomalyModel, ModelLoader};
use fraud_detector::scorer::Scorer;
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fraud_detector=info".parse()?)
                .add_directive("train_model=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let output = args.get(1).map(|s| s.as_str()).unwrap_or("fraud_model.json");
    let seed: u64 = match args.get(2) {
        Some(raw) => raw.parse().with_context(|| format!("Invalid seed {raw:?}"))?,
        None => 42,
    };

    info!(output = %output, seed, "Training reference model");

    let artifact = fit_reference_model(seed).context("Failed to fit reference model")?;
    let loader = ModelLoader::new();
    loader
        .save_forest(output, &artifact)
        .context("Failed to write model artifact")?;

    // Sanity check through the same path the detector uses.
    let model = loader.load(output)?;
    let scorer = Scorer::new(model.convention().unwrap_or_default());
    for amount in [55.0, 600.0] {
        let decision = scorer.score(&model, &FeatureVector::new(vec![amount]))?;
        info!(amount, decision = %decision, "Reference prediction");
    }
    info!(model = model.name(), version = model.version().unwrap_or("-"), "Done");

    Ok(())
}
