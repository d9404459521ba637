//! Anomaly model components

pub mod isolation_forest;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod training;

pub use isolation_forest::{Contamination, ForestParams, IsolationForest};
pub use loader::{ForestArtifact, LoadedModel, ModelLoader};

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::feature_extractor::FeatureVector;

/// Raw model output for one row, before any decision policy is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawScore(pub i64);

/// A fitted, read-only anomaly model.
pub trait AnomalyModel: Send + Sync {
    /// Human readable model name for logs
    fn name(&self) -> &str;

    /// Feature names the model was fitted on, when the artifact records them
    fn feature_names(&self) -> Option<&[String]>;

    /// Predict raw labels for a batch of rows, one output per row
    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<RawScore>, ModelError>;
}
