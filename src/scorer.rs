//! Decision policy: raw model output to NORMAL / ANOMALY.
//!
//! Estimators disagree on how they encode "outlier" (sign conventions,
//! sentinel labels). The pipeline never looks at raw values directly; it goes
//! through a [`LabelConvention`], which names each raw label as a
//! [`RawVerdict`] that then maps to a [`Decision`].

use serde::{Deserialize, Serialize};

use crate::error::ScoreError;
use crate::feature_extractor::FeatureVector;
use crate::models::{AnomalyModel, RawScore};

/// Outcome for one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Normal,
    Anomaly,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Normal => "NORMAL",
            Decision::Anomaly => "ANOMALY",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a raw label means under a convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawVerdict {
    Inlier,
    Outlier,
}

impl From<RawVerdict> for Decision {
    fn from(verdict: RawVerdict) -> Self {
        match verdict {
            RawVerdict::Inlier => Decision::Normal,
            RawVerdict::Outlier => Decision::Anomaly,
        }
    }
}

/// Which raw labels an estimator uses for inliers and outliers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelConvention {
    pub inlier: i64,
    pub outlier: i64,
}

impl LabelConvention {
    /// `1` for inliers, `-1` for outliers
    pub const ISOLATION_FOREST: Self = Self {
        inlier: 1,
        outlier: -1,
    };

    pub const fn new(inlier: i64, outlier: i64) -> Self {
        Self { inlier, outlier }
    }

    /// A convention is only usable when the two labels differ.
    pub fn is_valid(&self) -> bool {
        self.inlier != self.outlier
    }

    /// Name a raw label. Labels outside the convention are an error, never a guess.
    pub fn classify(&self, raw: RawScore) -> Result<RawVerdict, ScoreError> {
        match raw.0 {
            v if v == self.inlier => Ok(RawVerdict::Inlier),
            v if v == self.outlier => Ok(RawVerdict::Outlier),
            v => Err(ScoreError::UnrecognizedLabel(v)),
        }
    }
}

impl Default for LabelConvention {
    fn default() -> Self {
        Self::ISOLATION_FOREST
    }
}

/// Runs the model on a single row and applies the label convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    convention: LabelConvention,
}

impl Scorer {
    pub fn new(convention: LabelConvention) -> Self {
        Self { convention }
    }

    pub fn convention(&self) -> LabelConvention {
        self.convention
    }

    /// Score one feature vector as a single-row batch.
    pub fn score<M>(&self, model: &M, features: &FeatureVector) -> Result<Decision, ScoreError>
    where
        M: AnomalyModel + ?Sized,
    {
        let raw = model
            .predict(std::slice::from_ref(features))?
            .first()
            .copied()
            .ok_or(ScoreError::EmptyOutput)?;

        Ok(self.convention.classify(raw)?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;

    /// Flags anything above a fixed amount, using a caller-chosen label pair.
    struct Threshold {
        limit: f64,
        labels: LabelConvention,
    }

    impl AnomalyModel for Threshold {
        fn name(&self) -> &str {
            "threshold"
        }

        fn feature_names(&self) -> Option<&[String]> {
            None
        }

        fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<RawScore>, ModelError> {
            Ok(batch
                .iter()
                .map(|row| {
                    if row.as_slice()[0] > self.limit {
                        RawScore(self.labels.outlier)
                    } else {
                        RawScore(self.labels.inlier)
                    }
                })
                .collect())
        }
    }

    struct Silent;

    impl AnomalyModel for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        fn feature_names(&self) -> Option<&[String]> {
            None
        }

        fn predict(&self, _batch: &[FeatureVector]) -> Result<Vec<RawScore>, ModelError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_isolation_forest_convention() {
        let convention = LabelConvention::ISOLATION_FOREST;
        assert_eq!(convention.classify(RawScore(1)).unwrap(), RawVerdict::Inlier);
        assert_eq!(convention.classify(RawScore(-1)).unwrap(), RawVerdict::Outlier);
        assert!(matches!(
            convention.classify(RawScore(0)),
            Err(ScoreError::UnrecognizedLabel(0))
        ));
    }

    #[test]
    fn test_verdict_to_decision() {
        assert_eq!(Decision::from(RawVerdict::Inlier), Decision::Normal);
        assert_eq!(Decision::from(RawVerdict::Outlier), Decision::Anomaly);
    }

    #[test]
    fn test_convention_is_swappable() {
        // A classifier-style model that emits 0 for normal and 1 for fraud.
        let labels = LabelConvention::new(0, 1);
        let model = Threshold { limit: 100.0, labels };
        let scorer = Scorer::new(labels);

        let low = FeatureVector::new(vec![55.0]);
        let high = FeatureVector::new(vec![600.0]);
        assert_eq!(scorer.score(&model, &low).unwrap(), Decision::Normal);
        assert_eq!(scorer.score(&model, &high).unwrap(), Decision::Anomaly);

        // The same outputs read under the wrong convention are refused.
        let wrong = Scorer::new(LabelConvention::ISOLATION_FOREST);
        assert!(matches!(
            wrong.score(&model, &low),
            Err(ScoreError::UnrecognizedLabel(0))
        ));
    }

    #[test]
    fn test_score_is_deterministic() {
        let labels = LabelConvention::ISOLATION_FOREST;
        let model = Threshold { limit: 100.0, labels };
        let scorer = Scorer::new(labels);
        let features = FeatureVector::new(vec![99.0]);

        let first = scorer.score(&model, &features).unwrap();
        for _ in 0..20 {
            assert_eq!(scorer.score(&model, &features).unwrap(), first);
        }
    }

    #[test]
    fn test_empty_output_is_an_error() {
        let scorer = Scorer::default();
        assert!(matches!(
            scorer.score(&Silent, &FeatureVector::new(vec![1.0])),
            Err(ScoreError::EmptyOutput)
        ));
    }

    #[test]
    fn test_convention_validity() {
        assert!(LabelConvention::ISOLATION_FOREST.is_valid());
        assert!(!LabelConvention::new(1, 1).is_valid());
    }

    #[test]
    fn test_decision_wire_names() {
        assert_eq!(serde_json::to_string(&Decision::Anomaly).unwrap(), "\"ANOMALY\"");
        assert_eq!(Decision::Normal.to_string(), "NORMAL");
    }
}
