//! Fraud Detector Library
//!
//! Streaming anomaly detection for payment transactions: records arrive over
//! NATS, are reduced to the feature vector the model was fitted on, scored by
//! a frozen isolation forest and routed to an alert sink.

pub mod app;
pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod scorer;
pub mod sink;
pub mod telemetry;
pub mod types;

pub use config::AppConfig;
pub use consumer::TransactionConsumer;
pub use error::{MessageError, ModelError, PipelineError, Rejection, ScoreError};
pub use feature_extractor::{FeatureExtractor, FeatureVector};
pub use models::{AnomalyModel, LoadedModel, ModelLoader, RawScore};
pub use pipeline::Pipeline;
pub use scorer::{Decision, LabelConvention, Scorer};
pub use sink::{AlertSink, LogSink, NatsAlertSink};
pub use types::{alert::AlertRecord, transaction::Transaction};
