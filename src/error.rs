//! Error taxonomy for the detection pipeline.
//!
//! Errors are split by who has to react to them: [`ModelError`] and
//! [`PipelineError`] are fatal for the process, while everything wrapped in
//! [`MessageError`] is scoped to a single message and only ever logged.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while locating, reading or running the model artifact.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Nothing exists at the configured artifact location.
    #[error("model artifact not found at {}", .path.display())]
    Absent { path: PathBuf },

    #[error("failed to read model artifact {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model artifact {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The artifact parsed but describes a model that cannot be evaluated.
    #[error("invalid model artifact {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("unsupported artifact format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("unsupported artifact type for {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    /// The artifact was fitted on a different feature layout than the extractor produces.
    #[error("model expects features {expected:?} but extractor produces {actual:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("input has {actual} features, model was fitted on {expected}")]
    InputShape { expected: usize, actual: usize },

    #[error("cannot fit a model on an empty dataset")]
    EmptyTrainingSet,

    #[error("model runtime error: {0}")]
    Runtime(String),
}

impl ModelError {
    /// True when the artifact is simply missing, as opposed to present but unusable.
    pub fn is_absent(&self) -> bool {
        matches!(self, ModelError::Absent { .. })
    }
}

/// Why the feature extractor declined a transaction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("missing amount")]
    MissingAmount,

    #[error("amount is not numeric: {0}")]
    InvalidAmount(String),

    #[error("amount is not a finite number: {0}")]
    NonFinite(f64),
}

/// Failures while turning a feature vector into a decision.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("model returned no prediction")]
    EmptyOutput,

    #[error("model returned unrecognized raw label {0}")]
    UnrecognizedLabel(i64),
}

/// Per-message failure from one of the pipeline stages.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("transaction rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("scoring failed: {0}")]
    Score(#[from] ScoreError),
}

impl MessageError {
    /// Stage name used in logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            MessageError::Decode(_) => "decode",
            MessageError::Rejected(_) => "extract",
            MessageError::Score(_) => "score",
        }
    }
}

/// Failures that stop the consumer loop.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transport subscription closed")]
    TransportClosed,
}
