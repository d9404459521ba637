//! Alert records emitted for scored transactions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scorer::Decision;
use crate::types::transaction::Transaction;

/// Visibility of an emitted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Routine confirmation for a normal transaction
    Info,
    /// High-visibility audit record for an anomalous transaction
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Critical => "critical",
        }
    }
}

impl From<Decision> for Severity {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Normal => Severity::Info,
            Decision::Anomaly => Severity::Critical,
        }
    }
}

/// Audit record for one scored transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    /// Unique alert identifier
    pub alert_id: String,
    pub severity: Severity,
    pub transaction_id: Option<String>,
    pub user_id: Option<String>,
    pub amount: Option<f64>,
    pub decision: Decision,
    pub timestamp: DateTime<Utc>,
}

impl AlertRecord {
    /// Build the record for a decision on a transaction
    pub fn new(decision: Decision, transaction: &Transaction) -> Self {
        Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            severity: Severity::from(decision),
            transaction_id: transaction.id.clone(),
            user_id: transaction.user_id.clone(),
            amount: transaction.amount_value(),
            decision,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_follows_decision() {
        assert_eq!(Severity::from(Decision::Normal), Severity::Info);
        assert_eq!(Severity::from(Decision::Anomaly), Severity::Critical);
    }

    #[test]
    fn test_alert_record_wire_shape() {
        let tx = Transaction::new("t2", "u2", 600.0);
        let alert = AlertRecord::new(Decision::Anomaly, &tx);

        let json: serde_json::Value = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["transactionId"], "t2");
        assert_eq!(json["userId"], "u2");
        assert_eq!(json["amount"], 600.0);
        assert_eq!(json["decision"], "ANOMALY");
        assert!(json["alertId"].as_str().is_some());
    }
}
