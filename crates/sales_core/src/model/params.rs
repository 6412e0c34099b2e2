//! Hyperparameters of the tree-ensemble families

use crate::errors::{Result, SalesError};
use serde::{Deserialize, Serialize};

/// Gradient-boosted trees hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GbdtParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Fraction of rows sampled (without replacement) per tree
    pub subsample: f64,
    /// Fraction of features sampled per tree
    pub colsample_bytree: f64,
    /// Minimum hessian sum in each child
    pub min_child_weight: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 6,
            learning_rate: 0.3,
            subsample: 1.0,
            colsample_bytree: 1.0,
            min_child_weight: 1.0,
            reg_alpha: 0.0,
            reg_lambda: 1.0,
        }
    }
}

impl GbdtParams {
    pub fn validate(&self) -> Result<()> {
        let fraction = |name: &str, v: f64| {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(SalesError::InvalidParameters(format!(
                    "{name} must be in (0, 1], got {v}"
                )))
            }
        };
        let non_negative = |name: &str, v: f64| {
            if v >= 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(SalesError::InvalidParameters(format!(
                    "{name} must be a finite non-negative number, got {v}"
                )))
            }
        };

        if self.n_estimators == 0 {
            return Err(SalesError::InvalidParameters(
                "n_estimators must be at least 1".into(),
            ));
        }
        if self.max_depth == 0 {
            return Err(SalesError::InvalidParameters(
                "max_depth must be at least 1".into(),
            ));
        }
        fraction("learning_rate", self.learning_rate)?;
        fraction("subsample", self.subsample)?;
        fraction("colsample_bytree", self.colsample_bytree)?;
        non_negative("min_child_weight", self.min_child_weight)?;
        non_negative("reg_alpha", self.reg_alpha)?;
        non_negative("reg_lambda", self.reg_lambda)?;
        Ok(())
    }
}

/// Number of features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    All,
    Fraction(f64),
}

impl MaxFeatures {
    /// Resolve against the number of available features (at least one)
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Fraction(f) => (n_features as f64 * f) as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// How a split threshold is chosen for a candidate feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Best threshold by impurity reduction
    Best,
    /// One uniformly drawn threshold between the node's min and max
    Random,
}

/// Bagged-tree family hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub split_strategy: SplitStrategy,
}

impl ForestParams {
    /// Bootstrap sampling with best splits
    pub fn random_forest() -> Self {
        Self {
            n_estimators: 500,
            max_depth: 15,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            split_strategy: SplitStrategy::Best,
        }
    }

    /// Whole training set per tree with random splits
    pub fn extra_trees() -> Self {
        Self {
            bootstrap: false,
            split_strategy: SplitStrategy::Random,
            ..Self::random_forest()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 || self.max_depth == 0 {
            return Err(SalesError::InvalidParameters(
                "forest needs at least one tree of depth one".into(),
            ));
        }
        if self.min_samples_split < 2 || self.min_samples_leaf == 0 {
            return Err(SalesError::InvalidParameters(format!(
                "min_samples_split must be >= 2 and min_samples_leaf >= 1, got {} and {}",
                self.min_samples_split, self.min_samples_leaf
            )));
        }
        if let MaxFeatures::Fraction(f) = self.max_features {
            if !(f > 0.0 && f <= 1.0) {
                return Err(SalesError::InvalidParameters(format!(
                    "max_features fraction must be in (0, 1], got {f}"
                )));
            }
        }
        Ok(())
    }
}

/// Hyperparameters a trained model was fitted with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hyperparameters {
    Gbdt(GbdtParams),
    Forest(ForestParams),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gbdt_validation() {
        assert!(GbdtParams::default().validate().is_ok());
        let bad = GbdtParams {
            subsample: 0.0,
            ..GbdtParams::default()
        };
        assert!(bad.validate().is_err());
        let bad = GbdtParams {
            reg_lambda: -1.0,
            ..GbdtParams::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_forest_presets() {
        let rf = ForestParams::random_forest();
        let et = ForestParams::extra_trees();
        assert!(rf.validate().is_ok() && et.validate().is_ok());
        assert!(rf.bootstrap && !et.bootstrap);
        assert_eq!(et.n_estimators, 500);
        assert_eq!(et.split_strategy, SplitStrategy::Random);
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(14), 3);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
        assert_eq!(MaxFeatures::All.resolve(14), 14);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(14), 1);
    }
}
