//! Isolation forest anomaly estimator.
//!
//! Scores follow the usual isolation-forest convention: `score_samples` is the
//! negated anomaly score `-2^(-E[h(x)] / c(psi))`, so lower means more
//! anomalous. The `offset` learned at fit time turns that into a decision
//! function whose sign gives the raw label (`1` inlier, `-1` outlier).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ModelError;
use crate::feature_extractor::FeatureVector;
use crate::models::RawScore;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Raw label for points the forest considers normal
pub const INLIER: i64 = 1;
/// Raw label for points the forest isolates early
pub const OUTLIER: i64 = -1;

/// Expected share of outliers in the training data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Contamination {
    /// Fixed offset of -0.5, as in the original isolation-forest paper
    Auto,
    /// Offset placed at this quantile of the training scores, in (0, 0.5]
    Fraction(f64),
}

/// Fitting parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: Contamination,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: Contamination::Auto,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "lowercase")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

/// A fitted isolation forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<Node>,
    /// Subsample size each tree was grown on
    samples_per_tree: usize,
    n_features: usize,
    offset: f64,
}

impl IsolationForest {
    /// Fit a forest on `data`. Every row must have the same length.
    pub fn fit(data: &[FeatureVector], params: &ForestParams) -> Result<Self, ModelError> {
        let first = data.first().ok_or(ModelError::EmptyTrainingSet)?;
        let n_features = first.len();
        if let Some(bad) = data.iter().find(|row| row.len() != n_features) {
            return Err(ModelError::InputShape {
                expected: n_features,
                actual: bad.len(),
            });
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let samples_per_tree = params.max_samples.clamp(1, data.len());
        let height_limit = (samples_per_tree.max(2) as f64).log2().ceil() as usize;

        let trees = (0..params.n_estimators.max(1))
            .map(|_| {
                let rows: Vec<&[f64]> =
                    rand::seq::index::sample(&mut rng, data.len(), samples_per_tree)
                        .into_iter()
                        .map(|i| data[i].as_slice())
                        .collect();
                grow(&rows, 0, height_limit, n_features, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            samples_per_tree,
            n_features,
            offset: -0.5,
        };

        if let Contamination::Fraction(fraction) = params.contamination {
            let mut scores: Vec<f64> =
                data.iter().map(|row| forest.score_row(row.as_slice())).collect();
            scores.sort_by(f64::total_cmp);
            forest.offset = percentile(&scores, fraction.clamp(0.0, 0.5));
        }

        debug!(
            trees = forest.trees.len(),
            samples_per_tree,
            offset = forest.offset,
            "Isolation forest fitted"
        );

        Ok(forest)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Check that a deserialized forest can be evaluated on any row of
    /// `n_features` values. Returns the first defect found.
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if self.samples_per_tree == 0 {
            return Err("samples_per_tree must be positive".to_string());
        }
        if self.n_features == 0 {
            return Err("forest has no features".to_string());
        }
        if !self.offset.is_finite() {
            return Err(format!("offset {} is not finite", self.offset));
        }
        for (index, tree) in self.trees.iter().enumerate() {
            check_node(tree, self.n_features)
                .map_err(|reason| format!("tree {index}: {reason}"))?;
        }
        Ok(())
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Negated anomaly score in [-1, 0); lower is more anomalous.
    pub fn score_samples(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        self.check_shape(features)?;
        Ok(self.score_row(features.as_slice()))
    }

    /// Score shifted by the fitted offset; negative means outlier.
    pub fn decision_function(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        Ok(self.score_samples(features)? - self.offset)
    }

    /// Raw labels for a batch: [`INLIER`] or [`OUTLIER`] per row.
    pub fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<RawScore>, ModelError> {
        batch
            .iter()
            .map(|row| {
                let label = if self.decision_function(row)? < 0.0 {
                    OUTLIER
                } else {
                    INLIER
                };
                Ok(RawScore(label))
            })
            .collect()
    }

    fn check_shape(&self, features: &FeatureVector) -> Result<(), ModelError> {
        if features.len() != self.n_features {
            return Err(ModelError::InputShape {
                expected: self.n_features,
                actual: features.len(),
            });
        }
        Ok(())
    }

    fn score_row(&self, row: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| path_length(tree, row, 0)).sum();
        let mean_depth = total / self.trees.len() as f64;
        -(2f64).powf(-mean_depth / average_path_length(self.samples_per_tree))
    }
}

fn grow(rows: &[&[f64]], depth: usize, limit: usize, n_features: usize, rng: &mut StdRng) -> Node {
    if depth >= limit || rows.len() <= 1 {
        return Node::Leaf { size: rows.len() };
    }

    // Only features with spread can separate the rows.
    let candidates: Vec<(usize, f64, f64)> = (0..n_features)
        .filter_map(|f| {
            let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                (lo.min(r[f]), hi.max(r[f]))
            });
            (lo < hi).then_some((f, lo, hi))
        })
        .collect();

    if candidates.is_empty() {
        return Node::Leaf { size: rows.len() };
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
        rows.iter().copied().partition(|r| r[feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(grow(&left, depth + 1, limit, n_features, rng)),
        right: Box::new(grow(&right, depth + 1, limit, n_features, rng)),
    }
}

fn path_length(node: &Node, row: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            let next = match row.get(*feature) {
                Some(value) if value < threshold => left,
                _ => right,
            };
            path_length(next, row, depth + 1)
        }
    }
}

fn check_node(node: &Node, n_features: usize) -> Result<(), String> {
    match node {
        Node::Leaf { .. } => Ok(()),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if *feature >= n_features {
                return Err(format!("split on feature {feature}, forest has {n_features}"));
            }
            if !threshold.is_finite() {
                return Err(format!("split threshold {threshold} is not finite"));
            }
            check_node(left, n_features)?;
            check_node(right, n_features)
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated quantile of sorted values, `q` in [0, 1].
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let weight = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
