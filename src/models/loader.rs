//! Model artifact loading

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ModelError;
use crate::feature_extractor::{FeatureVector, FEATURE_NAMES};
use crate::models::isolation_forest::IsolationForest;
#[cfg(feature = "onnx")]
use crate::models::onnx::OnnxModel;
use crate::models::{AnomalyModel, RawScore};
use crate::scorer::LabelConvention;

/// Version of the JSON artifact layout this build reads and writes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Serialized isolation forest plus the contract it was fitted under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestArtifact {
    pub format_version: u32,
    pub model_version: String,
    pub trained_at: DateTime<Utc>,
    /// Feature names in the order the forest was fitted on
    pub features: Vec<String>,
    pub convention: LabelConvention,
    pub forest: IsolationForest,
}

impl ForestArtifact {
    /// Wrap a freshly fitted forest using the current feature layout
    pub fn new(forest: IsolationForest, model_version: impl Into<String>) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            model_version: model_version.into(),
            trained_at: Utc::now(),
            features: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            convention: LabelConvention::ISOLATION_FOREST,
            forest,
        }
    }
}

/// A model artifact loaded for the lifetime of the process
pub enum LoadedModel {
    Forest(ForestArtifact),
    #[cfg(feature = "onnx")]
    Onnx(OnnxModel),
}

impl LoadedModel {
    /// Label convention recorded in the artifact, if the format carries one
    pub fn convention(&self) -> Option<LabelConvention> {
        match self {
            LoadedModel::Forest(artifact) => Some(artifact.convention),
            #[cfg(feature = "onnx")]
            LoadedModel::Onnx(_) => None,
        }
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            LoadedModel::Forest(artifact) => Some(&artifact.model_version),
            #[cfg(feature = "onnx")]
            LoadedModel::Onnx(_) => None,
        }
    }

    /// Fail when the artifact was fitted on a different feature layout.
    ///
    /// Artifacts that do not record their features pass unchecked.
    pub fn check_features(&self, expected: &[&str]) -> Result<(), ModelError> {
        let Some(fitted) = self.feature_names() else {
            return Ok(());
        };
        if fitted.iter().map(String::as_str).ne(expected.iter().copied()) {
            return Err(ModelError::FeatureMismatch {
                expected: fitted.to_vec(),
                actual: expected.iter().map(|s| s.to_string()).collect(),
            });
        }
        Ok(())
    }
}

impl AnomalyModel for LoadedModel {
    fn name(&self) -> &str {
        match self {
            LoadedModel::Forest(_) => "isolation_forest",
            #[cfg(feature = "onnx")]
            LoadedModel::Onnx(model) => model.name(),
        }
    }

    fn feature_names(&self) -> Option<&[String]> {
        match self {
            LoadedModel::Forest(artifact) => Some(&artifact.features),
            #[cfg(feature = "onnx")]
            LoadedModel::Onnx(model) => model.feature_names(),
        }
    }

    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<RawScore>, ModelError> {
        match self {
            LoadedModel::Forest(artifact) => artifact.forest.predict(batch),
            #[cfg(feature = "onnx")]
            LoadedModel::Onnx(model) => model.predict(batch),
        }
    }
}

/// Reads model artifacts from disk
pub struct ModelLoader {
    /// Intra-op threads for ONNX sessions
    #[cfg_attr(not(feature = "onnx"), allow(dead_code))]
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(onnx_threads: usize) -> Self {
        Self { onnx_threads }
    }

    /// Load the artifact at `path`.
    ///
    /// A missing file is reported as [`ModelError::Absent`] so the caller can
    /// tell "not deployed yet" apart from a corrupt artifact.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<LoadedModel, ModelError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ModelError::Absent {
                path: path.to_path_buf(),
            });
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let model = match extension.as_deref() {
            Some("json") => LoadedModel::Forest(self.load_forest(path)?),
            #[cfg(feature = "onnx")]
            Some("onnx") => LoadedModel::Onnx(OnnxModel::load(path, self.onnx_threads)?),
            _ => {
                return Err(ModelError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };

        info!(
            path = %path.display(),
            model = model.name(),
            version = model.version().unwrap_or("-"),
            "Model loaded successfully"
        );

        Ok(model)
    }

    fn load_forest(&self, path: &Path) -> Result<ForestArtifact, ModelError> {
        let raw = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let artifact: ForestArtifact =
            serde_json::from_str(&raw).map_err(|source| ModelError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ModelError::UnsupportedVersion {
                found: artifact.format_version,
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }

        let invalid = |reason: String| ModelError::Invalid {
            path: path.to_path_buf(),
            reason,
        };
        artifact.forest.validate().map_err(invalid)?;
        if artifact.forest.n_features() != artifact.features.len() {
            return Err(invalid(format!(
                "forest was fitted on {} features but the artifact lists {}",
                artifact.forest.n_features(),
                artifact.features.len()
            )));
        }

        Ok(artifact)
    }

    /// Write a forest artifact as JSON
    pub fn save_forest<P: AsRef<Path>>(
        &self,
        path: P,
        artifact: &ForestArtifact,
    ) -> Result<(), ModelError> {
        let path = path.as_ref();
        let io_err = |source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        };

        let json = serde_json::to_string(artifact).map_err(|source| ModelError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, json).map_err(io_err)?;

        info!(path = %path.display(), version = %artifact.model_version, "Model artifact written");
        Ok(())
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
