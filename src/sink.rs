//! Alert sinks for scored transactions

use std::future::Future;

use async_nats::Client;
use tracing::{debug, error, info, warn};

use crate::scorer::Decision;
use crate::types::alert::{AlertRecord, Severity};
use crate::types::transaction::Transaction;

/// Destination for decisions.
///
/// Emission never fails from the caller's point of view: a sink that cannot
/// deliver logs the failure and returns.
pub trait AlertSink: Send + Sync {
    fn emit(
        &self,
        decision: Decision,
        transaction: &Transaction,
    ) -> impl Future<Output = ()> + Send;
}

/// Writes every decision as a structured log line
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    async fn emit(&self, decision: Decision, transaction: &Transaction) {
        let severity = Severity::from(decision);
        match decision {
            Decision::Anomaly => warn!(
                severity = severity.as_str(),
                transaction_id = transaction.id_or_unknown(),
                user_id = transaction.user_or_unknown(),
                amount = transaction.amount_value(),
                decision = decision.as_str(),
                "Anomalous transaction detected"
            ),
            Decision::Normal => info!(
                severity = severity.as_str(),
                transaction_id = transaction.id_or_unknown(),
                user_id = transaction.user_or_unknown(),
                amount = transaction.amount_value(),
                decision = decision.as_str(),
                "Transaction OK"
            ),
        }
    }
}

/// Publishes anomaly records to a NATS subject
#[derive(Clone)]
pub struct NatsAlertSink {
    client: Client,
    subject: String,
}

impl NatsAlertSink {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    async fn publish(&self, alert: &AlertRecord) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(alert)?;
        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;
        Ok(())
    }
}

impl AlertSink for NatsAlertSink {
    async fn emit(&self, decision: Decision, transaction: &Transaction) {
        // Normal decisions stay in the log; only anomalies go on the wire.
        if decision == Decision::Normal {
            LogSink.emit(decision, transaction).await;
            return;
        }

        let alert = AlertRecord::new(decision, transaction);
        let outcome = self.publish(&alert).await;
        report_publish(&self.subject, &alert, outcome);
    }
}

/// Log the result of publishing `alert`. A failed publish leaves the full
/// record in the error log instead.
fn report_publish(subject: &str, alert: &AlertRecord, outcome: anyhow::Result<()>) {
    let transaction_id = alert.transaction_id.as_deref().unwrap_or("-");
    match outcome {
        Ok(()) => debug!(
            alert_id = %alert.alert_id,
            transaction_id,
            subject = %subject,
            "Published anomaly alert"
        ),
        Err(e) => error!(
            error = %e,
            severity = alert.severity.as_str(),
            alert_id = %alert.alert_id,
            transaction_id,
            user_id = alert.user_id.as_deref().unwrap_or("-"),
            amount = alert.amount,
            decision = alert.decision.as_str(),
            subject = %subject,
            "Failed to publish anomaly alert"
        ),
    }
}

/// Which sink the process emits to
pub enum Sink {
    Log(LogSink),
    Nats(NatsAlertSink),
}

impl AlertSink for Sink {
    async fn emit(&self, decision: Decision, transaction: &Transaction) {
        match self {
            Sink::Log(sink) => sink.emit(decision, transaction).await,
            Sink::Nats(sink) => sink.emit(decision, transaction).await,
        }
    }
}
