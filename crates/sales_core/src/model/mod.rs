//! Trained tree-ensemble models
//!
//! All three model families share one representation, [`TreeEnsemble`]: a set
//! of regression trees combined either by summation on top of a base score
//! (gradient boosting) or by averaging (bagged forests).

pub mod params;
pub mod tree;

pub use params::{ForestParams, GbdtParams, Hyperparameters, MaxFeatures, SplitStrategy};
pub use tree::{Node, Tree};

use crate::errors::{Result, SalesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Anything that maps a feature vector to a predicted target
pub trait Regressor {
    fn predict(&self, features: &[f64]) -> Result<f64>;

    fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict(row)).collect()
    }
}

/// How per-tree outputs are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// `base_score + Σ tree(x)`
    Sum,
    /// `mean(tree(x))`
    Mean,
}

/// A fitted set of regression trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub trees: Vec<Tree>,
    pub base_score: f64,
    pub aggregation: Aggregation,
    /// Length of the feature vectors the ensemble was fitted on
    pub feature_count: usize,
}

impl TreeEnsemble {
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(SalesError::InvalidParameters("ensemble has no trees".into()));
        }
        if !self.base_score.is_finite() {
            return Err(SalesError::InvalidParameters(
                "ensemble base score is not finite".into(),
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_count)
                .map_err(|reason| SalesError::InvalidParameters(format!("tree {i}: {reason}")))?;
        }
        Ok(())
    }
}

impl Regressor for TreeEnsemble {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.feature_count {
            return Err(SalesError::InvalidParameters(format!(
                "expected {} features, got {}",
                self.feature_count,
                features.len()
            )));
        }
        let total: f64 = self.trees.iter().map(|t| t.evaluate(features)).sum();
        Ok(match self.aggregation {
            Aggregation::Sum => self.base_score + total,
            Aggregation::Mean if self.trees.is_empty() => self.base_score,
            Aggregation::Mean => total / self.trees.len() as f64,
        })
    }
}

/// The three model families trained and compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Gbdt,
    RandomForest,
    ExtraTrees,
}

impl ModelFamily {
    /// Training and tie-breaking order
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::Gbdt,
        ModelFamily::RandomForest,
        ModelFamily::ExtraTrees,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Gbdt => "gbdt",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::ExtraTrees => "extra_trees",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelFamily::Gbdt => "Gradient Boosted Trees",
            ModelFamily::RandomForest => "Random Forest",
            ModelFamily::ExtraTrees => "Extra Trees",
        }
    }

    /// Name of the persisted artifact holding this family's model
    pub fn artifact_name(&self) -> String {
        format!("model_{}", self.as_str())
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = SalesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "gbdt" | "xgboost" => Ok(ModelFamily::Gbdt),
            "random_forest" | "rf" => Ok(ModelFamily::RandomForest),
            "extra_trees" | "et" => Ok(ModelFamily::ExtraTrees),
            other => Err(SalesError::InvalidParameters(format!(
                "unknown model family: {other}"
            ))),
        }
    }
}

/// Held-out evaluation scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub rmse: f64,
    pub r2: f64,
}

/// A fitted model with its provenance and scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub family: ModelFamily,
    pub ensemble: TreeEnsemble,
    pub hyperparameters: Hyperparameters,
    /// Mean cross-validated negative MSE of the chosen configuration
    pub cv_score: Option<f64>,
    /// Held-out scores, set once the model is evaluated
    pub metrics: Option<EvaluationMetrics>,
}

impl Regressor for TrainedModel {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        self.ensemble.predict(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(left: f64, right: f64) -> Tree {
        Tree::new(vec![
            Node::internal(0, 0.0, 1, 2),
            Node::leaf(left),
            Node::leaf(right),
        ])
    }

    #[test]
    fn test_sum_aggregation_adds_base_score() {
        let ensemble = TreeEnsemble {
            trees: vec![stump(-1.0, 1.0), stump(-0.5, 0.5)],
            base_score: 10.0,
            aggregation: Aggregation::Sum,
            feature_count: 1,
        };
        assert_eq!(ensemble.predict(&[-3.0]).unwrap(), 8.5);
        assert_eq!(ensemble.predict(&[3.0]).unwrap(), 11.5);
    }

    #[test]
    fn test_mean_aggregation_averages_trees() {
        let ensemble = TreeEnsemble {
            trees: vec![stump(1.0, 3.0), stump(2.0, 5.0)],
            base_score: 0.0,
            aggregation: Aggregation::Mean,
            feature_count: 1,
        };
        assert_eq!(
            ensemble.predict_batch(&[vec![-1.0], vec![1.0]]).unwrap(),
            [1.5, 4.0]
        );
    }

    #[test]
    fn test_feature_count_mismatch() {
        let ensemble = TreeEnsemble {
            trees: vec![stump(1.0, 2.0)],
            base_score: 0.0,
            aggregation: Aggregation::Mean,
            feature_count: 2,
        };
        assert!(ensemble.predict(&[1.0]).is_err());
        assert!(ensemble.validate().is_ok());
    }

    #[test]
    fn test_family_names_round_trip() {
        for family in ModelFamily::ALL {
            assert_eq!(family.as_str().parse::<ModelFamily>().unwrap(), family);
        }
        assert_eq!(ModelFamily::RandomForest.artifact_name(), "model_random_forest");
        assert!("svm".parse::<ModelFamily>().is_err());
    }
}
