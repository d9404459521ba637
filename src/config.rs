//! Configuration management for the detector

use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::scorer::LabelConvention;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "FRAUD_DETECTOR_CONFIG";
/// Prefix for per-key environment overrides, e.g. `FRAUD_DETECTOR__MODEL__PATH`
pub const ENV_PREFIX: &str = "FRAUD_DETECTOR";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub model: ModelConfig,
    pub alerts: AlertsConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming transactions
    pub transaction_subject: String,
    /// Queue group shared by all detector instances
    pub queue_group: String,
    /// Subject for outgoing anomaly alerts (used by the `nats` sink)
    pub alert_subject: String,
}

/// Model artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Artifact file, `.json` (isolation forest) or `.onnx`
    pub path: PathBuf,
    /// Raw label the model uses for inliers
    #[serde(default = "default_inlier_label")]
    pub inlier_label: i64,
    /// Raw label the model uses for outliers
    #[serde(default = "default_outlier_label")]
    pub outlier_label: i64,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_inlier_label() -> i64 {
    LabelConvention::ISOLATION_FOREST.inlier
}

fn default_outlier_label() -> i64 {
    LabelConvention::ISOLATION_FOREST.outlier
}

fn default_onnx_threads() -> usize {
    1
}

impl ModelConfig {
    /// Label convention for artifacts that do not record their own
    pub fn convention(&self) -> LabelConvention {
        LabelConvention::new(self.inlier_label, self.outlier_label)
    }
}

/// Where decisions are emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Structured log lines only
    #[default]
    Log,
    /// Publish anomaly records to `nats.alert_subject`
    Nats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub sink: SinkKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Seconds between metrics summaries; 0 disables periodic reporting
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    30
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl AppConfig {
    /// Load configuration from `FRAUD_DETECTOR_CONFIG` or the default path.
    ///
    /// A missing file is not an error; defaults and environment overrides still apply.
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_layers(Path::new(&path), false)
    }

    /// Load configuration from a specific path, which must exist
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_layers(path.as_ref(), true)
    }

    fn load_layers(path: &Path, required: bool) -> Result<Self> {
        let config = Config::builder()
            .add_source(
                Config::try_from(&AppConfig::default()).context("Failed to encode defaults")?,
            )
            .add_source(File::from(path).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to build configuration from {}", path.display()))?;

        let app: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app.validate()?;
        Ok(app)
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.model.convention().is_valid(),
            "model.inlier_label and model.outlier_label must differ (both are {})",
            self.model.inlier_label
        );
        ensure!(
            !self.nats.transaction_subject.trim().is_empty(),
            "nats.transaction_subject must not be empty"
        );
        ensure!(
            !self.nats.queue_group.trim().is_empty(),
            "nats.queue_group must not be empty"
        );
        if self.alerts.sink == SinkKind::Nats {
            ensure!(
                !self.nats.alert_subject.trim().is_empty(),
                "nats.alert_subject is required for the nats sink"
            );
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                transaction_subject: "transactions".to_string(),
                queue_group: "fraud-detection-group".to_string(),
                alert_subject: "fraud.alerts".to_string(),
            },
            model: ModelConfig {
                path: PathBuf::from("fraud_model.json"),
                inlier_label: default_inlier_label(),
                outlier_label: default_outlier_label(),
                onnx_threads: default_onnx_threads(),
            },
            alerts: AlertsConfig {
                sink: SinkKind::Log,
            },
            pipeline: PipelineConfig {
                metrics_interval_secs: default_metrics_interval(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.nats.transaction_subject, "transactions");
        assert_eq!(config.nats.queue_group, "fraud-detection-group");
        assert_eq!(config.model.path, PathBuf::from("fraud_model.json"));
        assert_eq!(config.model.convention(), LabelConvention::ISOLATION_FOREST);
        assert_eq!(config.alerts.sink, SinkKind::Log);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_path_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[nats]
url = "nats://broker:4222"
transaction_subject = "payments"

[model]
path = "/srv/models/fraud_model.json"

[alerts]
sink = "nats"

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.nats.url, "nats://broker:4222");
        assert_eq!(config.nats.transaction_subject, "payments");
        // Untouched keys keep their defaults.
        assert_eq!(config.nats.queue_group, "fraud-detection-group");
        assert_eq!(config.model.path, PathBuf::from("/srv/models/fraud_model.json"));
        assert_eq!(config.model.outlier_label, -1);
        assert_eq!(config.alerts.sink, SinkKind::Nats);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.pipeline.metrics_interval_secs, 30);
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        assert!(AppConfig::load_from_path("/definitely/not/here.toml").is_err());
    }

    #[test]
    fn test_identical_labels_rejected() {
        let mut config = AppConfig::default();
        config.model.outlier_label = config.model.inlier_label;
        assert!(config.validate().is_err());
    }
}
