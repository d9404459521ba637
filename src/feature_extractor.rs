//! Feature extraction for anomaly model inference.
//!
//! The layout produced here is shared with the offline trainer: both sides
//! read [`FEATURE_NAMES`], and artifacts record the names they were fitted on
//! so a drift between the two is caught when the model is loaded.

use crate::error::Rejection;
use crate::types::transaction::{Amount, Transaction};

/// Feature names in the exact order the model consumes them.
pub const FEATURE_NAMES: &[&str] = &["amount"];

/// Fixed-shape numeric input for one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Single-precision copy for runtimes that take `f32` tensors
    pub fn to_f32(&self) -> Vec<f32> {
        self.0.iter().map(|&v| v as f32).collect()
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Maps transactions to model input features.
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract features from a transaction.
    ///
    /// A transaction without a usable amount is rejected; that is an expected
    /// outcome for upstream data, not a fault.
    pub fn extract(&self, tx: &Transaction) -> Result<FeatureVector, Rejection> {
        let amount = match &tx.amount {
            None => return Err(Rejection::MissingAmount),
            Some(Amount::Unparsed(raw)) => return Err(Rejection::InvalidAmount(raw.clone())),
            Some(Amount::Number(v)) => *v,
        };

        if !amount.is_finite() {
            return Err(Rejection::NonFinite(amount));
        }

        Ok(FeatureVector(vec![amount]))
    }

    /// Number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_NAMES.len()
    }

    /// Feature names, in vector order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        FEATURE_NAMES.to_vec()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_extraction() {
        let extractor = FeatureExtractor::new();

        for amount in [0.0, 55.0, 600.0, -12.25, 1e9] {
            let tx = Transaction::new("t", "u", amount);
            let features = extractor.extract(&tx).unwrap();
            assert_eq!(features.as_slice(), &[amount]);
            assert_eq!(features.len(), extractor.feature_count());
        }
    }

    #[test]
    fn test_missing_amount_rejected() {
        let extractor = FeatureExtractor::new();
        let tx = Transaction {
            id: Some("t3".to_string()),
            user_id: Some("u3".to_string()),
            amount: None,
        };
        assert_eq!(extractor.extract(&tx), Err(Rejection::MissingAmount));
    }

    #[test]
    fn test_non_numeric_amount_rejected() {
        let extractor = FeatureExtractor::new();
        let tx = Transaction::from_slice(br#"{"id":"t4","amount":"twelve"}"#).unwrap();
        assert_eq!(
            extractor.extract(&tx),
            Err(Rejection::InvalidAmount("twelve".to_string()))
        );
    }

    #[test]
    fn test_non_finite_amount_rejected() {
        let extractor = FeatureExtractor::new();
        let tx = Transaction::from_slice(br#"{"amount":"inf"}"#).unwrap();
        assert!(matches!(
            extractor.extract(&tx),
            Err(Rejection::NonFinite(v)) if v.is_infinite()
        ));
    }

    #[test]
    fn test_feature_count() {
        let extractor = FeatureExtractor::new();
        assert_eq!(extractor.feature_count(), 1);
        assert_eq!(extractor.feature_names(), vec!["amount"]);
    }
}
