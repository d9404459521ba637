#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use fraud_detector::models::training::fit_reference_model;
use fraud_detector::models::{ForestArtifact, ModelLoader};
use fraud_detector::{AlertSink, Decision, Transaction};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// The reference forest, fitted once per test binary
pub fn reference_artifact() -> &'static ForestArtifact {
    static ARTIFACT: OnceLock<ForestArtifact> = OnceLock::new();
    ARTIFACT.get_or_init(|| fit_reference_model(42).expect("reference model fits"))
}

/// Write the reference artifact into `dir` and return its path
pub fn write_reference_model(dir: &Path) -> PathBuf {
    let path = dir.join("fraud_model.json");
    ModelLoader::new()
        .save_forest(&path, reference_artifact())
        .expect("artifact written");
    path
}

pub fn payload(json: &str) -> Vec<u8> {
    json.as_bytes().to_vec()
}

/// Records the level of every event it sees
#[derive(Clone, Default)]
pub struct LevelCounter {
    levels: Arc<Mutex<Vec<Level>>>,
}

impl LevelCounter {
    pub fn dispatch(&self) -> Dispatch {
        Dispatch::new(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn count(&self, level: Level) -> usize {
        self.levels
            .lock()
            .unwrap()
            .iter()
            .filter(|l| **l == level)
            .count()
    }
}

impl<S: Subscriber> Layer<S> for LevelCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.levels.lock().unwrap().push(*event.metadata().level());
    }
}

/// Keeps every emitted decision in order
#[derive(Default)]
pub struct RecordingSink {
    pub emitted: Mutex<Vec<(Decision, Transaction)>>,
}

impl RecordingSink {
    pub fn decisions(&self) -> Vec<(Option<String>, Decision)> {
        self.emitted
            .lock()
            .unwrap()
            .iter()
            .map(|(decision, tx)| (tx.id.clone(), *decision))
            .collect()
    }
}

impl AlertSink for RecordingSink {
    async fn emit(&self, decision: Decision, transaction: &Transaction) {
        self.emitted
            .lock()
            .unwrap()
            .push((decision, transaction.clone()));
    }
}
