//! The consumer loop: decode, extract, score and dispatch, one message at a time.
//!
//! Each stage returns its own result. The supervisor in [`Pipeline::run`] is
//! the only place that decides what a failure means: message-level errors are
//! logged and skipped, and only the transport ending stops the loop with an
//! error. Shutdown is checked between messages, never during one.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::{Stream, StreamExt};
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, warn, Dispatch};

use crate::error::{MessageError, PipelineError};
use crate::feature_extractor::{FeatureExtractor, FeatureVector};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::models::AnomalyModel;
use crate::scorer::{Decision, Scorer};
use crate::sink::AlertSink;
use crate::types::transaction::Transaction;

/// A message that did not produce a decision
#[derive(Debug)]
pub struct SkippedMessage {
    pub error: MessageError,
    /// The decoded record, when decoding got that far
    pub transaction: Option<Transaction>,
}

/// Why the loop stopped without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
}

/// Final counters of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub reason: StopReason,
    pub metrics: MetricsSnapshot,
}

/// Single-worker detection pipeline over a read-only model
pub struct Pipeline<M: ?Sized, S> {
    model: Arc<M>,
    extractor: FeatureExtractor,
    scorer: Scorer,
    sink: S,
    metrics: Arc<PipelineMetrics>,
    logger: Option<Dispatch>,
}

impl<M, S> Pipeline<M, S>
where
    M: AnomalyModel + ?Sized,
    S: AlertSink,
{
    pub fn new(model: Arc<M>, scorer: Scorer, sink: S) -> Self {
        Self {
            model,
            extractor: FeatureExtractor::new(),
            scorer,
            sink,
            metrics: Arc::new(PipelineMetrics::new()),
            logger: None,
        }
    }

    /// Run the loop under this subscriber instead of the ambient default
    pub fn with_logger(mut self, logger: Dispatch) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Share an existing metrics collector, e.g. with a reporter task
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Decode stage
    pub fn decode(&self, payload: &[u8]) -> Result<Transaction, MessageError> {
        Ok(Transaction::from_slice(payload)?)
    }

    /// Extract stage
    pub fn extract(&self, transaction: &Transaction) -> Result<FeatureVector, MessageError> {
        Ok(self.extractor.extract(transaction)?)
    }

    /// Score stage
    pub fn score(&self, features: &FeatureVector) -> Result<Decision, MessageError> {
        Ok(self.scorer.score(self.model.as_ref(), features)?)
    }

    /// Dispatch stage; sinks absorb their own failures
    pub async fn dispatch(&self, decision: Decision, transaction: &Transaction) {
        self.sink.emit(decision, transaction).await;
    }

    /// Run one payload through every stage.
    ///
    /// The scorer is only reached when extraction succeeded.
    pub async fn process(&self, payload: &[u8]) -> Result<Decision, SkippedMessage> {
        let transaction = self.decode(payload).map_err(|error| SkippedMessage {
            error,
            transaction: None,
        })?;

        let outcome = self
            .extract(&transaction)
            .and_then(|features| self.score(&features));

        match outcome {
            Ok(decision) => {
                self.dispatch(decision, &transaction).await;
                Ok(decision)
            }
            Err(error) => Err(SkippedMessage {
                error,
                transaction: Some(transaction),
            }),
        }
    }

    /// Consume `messages` until `shutdown` resolves or the stream ends.
    ///
    /// Returns [`PipelineError::TransportClosed`] if the stream ends first.
    pub async fn run<St, F>(&self, messages: St, shutdown: F) -> Result<RunSummary, PipelineError>
    where
        St: Stream<Item = Vec<u8>> + Unpin,
        F: Future<Output = ()>,
    {
        let supervised = self.supervise(messages, shutdown);
        match &self.logger {
            Some(logger) => supervised.with_subscriber(logger.clone()).await,
            None => supervised.await,
        }
    }

    async fn supervise<St, F>(
        &self,
        mut messages: St,
        shutdown: F,
    ) -> Result<RunSummary, PipelineError>
    where
        St: Stream<Item = Vec<u8>> + Unpin,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(model = self.model.name(), "Consumer loop ready");

        loop {
            let payload = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping consumer loop");
                    return Ok(RunSummary {
                        reason: StopReason::Shutdown,
                        metrics: self.metrics.snapshot(),
                    });
                }
                next = messages.next() => match next {
                    Some(payload) => payload,
                    None => {
                        error!("Transaction stream ended");
                        return Err(PipelineError::TransportClosed);
                    }
                },
            };

            self.handle(&payload).await;
        }
    }

    async fn handle(&self, payload: &[u8]) {
        self.metrics.record_received();
        let start_time = Instant::now();

        match self.process(payload).await {
            Ok(decision) => {
                let processing_time = start_time.elapsed();
                self.metrics.record_decision(decision, processing_time);
                debug!(
                    decision = decision.as_str(),
                    processing_time_us = processing_time.as_micros() as u64,
                    "Transaction processed"
                );
            }
            Err(skipped) => {
                self.metrics.record_failure(&skipped.error);
                let tx = skipped.transaction.as_ref();
                warn!(
                    stage = skipped.error.stage(),
                    error = %skipped.error,
                    transaction_id = tx.map_or("-", Transaction::id_or_unknown),
                    user_id = tx.map_or("-", Transaction::user_or_unknown),
                    "Skipping message"
                );
            }
        }
    }
}
