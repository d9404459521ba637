//! Offline fitting of the reference model.
//!
//! Training data is built through [`FeatureExtractor`], the same path the
//! detector uses at inference time, so both sides agree on the feature layout.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::info;

use crate::error::ModelError;
use crate::feature_extractor::{FeatureExtractor, FeatureVector};
use crate::models::isolation_forest::{Contamination, ForestParams, IsolationForest};
use crate::models::loader::ForestArtifact;
use crate::types::transaction::Transaction;

/// A group of synthetic amounts drawn from a normal distribution
#[derive(Debug, Clone, Copy)]
pub struct AmountCluster {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

/// Everyday spend around 50 plus two bands of outsized amounts
pub const REFERENCE_CLUSTERS: [AmountCluster; 3] = [
    AmountCluster {
        count: 1000,
        mean: 50.0,
        std_dev: 10.0,
    },
    AmountCluster {
        count: 50,
        mean: 500.0,
        std_dev: 50.0,
    },
    AmountCluster {
        count: 10,
        mean: 1000.0,
        std_dev: 100.0,
    },
];

/// Share of the reference data expected to be outliers
pub const REFERENCE_CONTAMINATION: f64 = 0.06;

/// Synthetic transactions for the given clusters
pub fn synthetic_transactions(clusters: &[AmountCluster], seed: u64) -> Vec<Transaction> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut transactions = Vec::new();

    for cluster in clusters {
        // A zero or negative spread degenerates to a constant amount.
        let spread = cluster.std_dev.max(f64::MIN_POSITIVE);
        let Ok(normal) = Normal::new(cluster.mean, spread) else {
            continue;
        };
        for _ in 0..cluster.count {
            let n = transactions.len();
            transactions.push(Transaction::new(
                format!("train_{n}"),
                "reference",
                normal.sample(&mut rng),
            ));
        }
    }

    transactions
}

/// Feature vectors for training, built by the inference-time extractor
pub fn training_features(transactions: &[Transaction]) -> Vec<FeatureVector> {
    let extractor = FeatureExtractor::new();
    transactions
        .iter()
        .filter_map(|tx| extractor.extract(tx).ok())
        .collect()
}

/// Fit a forest on the reference dataset and wrap it as an artifact
pub fn fit_reference_model(seed: u64) -> Result<ForestArtifact, ModelError> {
    let transactions = synthetic_transactions(&REFERENCE_CLUSTERS, seed);
    let features = training_features(&transactions);

    let params = ForestParams {
        contamination: Contamination::Fraction(REFERENCE_CONTAMINATION),
        seed,
        ..ForestParams::default()
    };
    let forest = IsolationForest::fit(&features, &params)?;

    info!(
        samples = features.len(),
        trees = forest.n_estimators(),
        offset = forest.offset(),
        "Reference model fitted"
    );

    Ok(ForestArtifact::new(forest, format!("reference-seed{seed}")))
}
