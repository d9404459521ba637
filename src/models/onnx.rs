//! ONNX Runtime backed anomaly model.
//!
//! Expects an isolation forest exported with skl2onnx, whose `label` output
//! carries the raw `1`/`-1` prediction per row.

use std::path::Path;
use std::sync::Mutex;

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tracing::{debug, info};

use crate::error::ModelError;
use crate::feature_extractor::FeatureVector;
use crate::models::{AnomalyModel, RawScore};

const LABEL_OUTPUT: &str = "label";

fn runtime(e: impl std::fmt::Display) -> ModelError {
    ModelError::Runtime(e.to_string())
}

/// Loaded ONNX model
pub struct OnnxModel {
    name: String,
    /// Running a session needs exclusive access
    session: Mutex<Session>,
    input_name: String,
}

impl OnnxModel {
    /// Load a model from file with the given intra-op thread count
    pub fn load(path: &Path, threads: usize) -> Result<Self, ModelError> {
        let session = Session::builder()
            .map_err(runtime)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(runtime)?
            .with_intra_threads(threads.max(1))
            .map_err(runtime)?
            .commit_from_file(path)
            .map_err(runtime)?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "X".to_string());

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        info!(model = %name, input = %input_name, threads, "ONNX model loaded");

        Ok(Self {
            name,
            session: Mutex::new(session),
            input_name,
        })
    }
}

impl AnomalyModel for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<RawScore>, ModelError> {
        let Some(width) = batch.first().map(FeatureVector::len) else {
            return Ok(Vec::new());
        };

        let data: Vec<f32> = batch.iter().flat_map(|row| row.to_f32()).collect();
        let shape = vec![batch.len() as i64, width as i64];
        let input = Tensor::from_array((shape, data)).map_err(runtime)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| ModelError::Runtime(format!("Lock error: {}", e)))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(runtime)?;

        // Prefer the named label output, otherwise take the first int64 tensor.
        let labels: Vec<i64> = match outputs.get(LABEL_OUTPUT) {
            Some(output) => {
                let (_, data) = output.try_extract_tensor::<i64>().map_err(runtime)?;
                data.to_vec()
            }
            None => outputs
                .iter()
                .find_map(|(_, output)| {
                    output
                        .try_extract_tensor::<i64>()
                        .ok()
                        .map(|(_, data)| data.to_vec())
                })
                .ok_or_else(|| ModelError::Runtime("model has no int64 label output".to_string()))?,
        };

        debug!(model = %self.name, rows = batch.len(), "ONNX inference complete");

        Ok(labels.into_iter().map(RawScore).collect())
    }
}
