//! Numeric training datasets
//!
//! A [`Dataset`] is the preprocessor's output matrix with its targets, plus
//! the histogram bins used by tree growing. Bins are computed from the
//! dataset's own rows, so a cross-validation fold never sees cut points from
//! its validation rows.

use crate::binning::{BinnedMatrix, MAX_BINS};
use crate::errors::{Result, TrainerError};

/// Training dataset with float features and targets
#[derive(Clone, Debug)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
    pub feature_count: usize,
    binned: BinnedMatrix,
}

impl Dataset {
    /// Validate shape and finiteness, then bin
    pub fn new(features: Vec<Vec<f64>>, targets: Vec<f64>) -> Result<Self> {
        if features.is_empty() {
            return Err(TrainerError::Dataset("Dataset is empty".into()));
        }
        if features.len() != targets.len() {
            return Err(TrainerError::Dataset(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }

        let feature_count = features[0].len();
        if feature_count == 0 {
            return Err(TrainerError::Dataset("Dataset has no features".into()));
        }
        for (i, row) in features.iter().enumerate() {
            if row.len() != feature_count {
                return Err(TrainerError::Dataset(format!(
                    "Row {}: expected {} features, got {}",
                    i,
                    feature_count,
                    row.len()
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(TrainerError::Dataset(format!("Row {i}: non-finite feature")));
            }
        }
        if let Some(i) = targets.iter().position(|t| !t.is_finite()) {
            return Err(TrainerError::Dataset(format!("Row {i}: non-finite target")));
        }

        let binned = BinnedMatrix::from_rows(&features, feature_count, MAX_BINS);
        Ok(Self {
            features,
            targets,
            feature_count,
            binned,
        })
    }

    /// New dataset over `rows` (re-binned on those rows only)
    pub fn subset(&self, rows: &[usize]) -> Result<Self> {
        Self::new(
            rows.iter().map(|&r| self.features[r].clone()).collect(),
            rows.iter().map(|&r| self.targets[r]).collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn binned(&self) -> &BinnedMatrix {
        &self.binned
    }

    pub fn target_mean(&self) -> f64 {
        self.targets.iter().sum::<f64>() / self.targets.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_ragged_rows() {
        let err = Dataset::new(vec![vec![1.0, 2.0], vec![3.0]], vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, TrainerError::Dataset(_)));
    }

    #[test]
    fn test_rejects_non_finite_values() {
        assert!(Dataset::new(vec![vec![f64::NAN]], vec![1.0]).is_err());
        assert!(Dataset::new(vec![vec![1.0]], vec![f64::INFINITY]).is_err());
        assert!(Dataset::new(vec![], vec![]).is_err());
    }

    #[test]
    fn test_subset_rebins() {
        let ds = Dataset::new(
            vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]],
            vec![10.0, 20.0, 30.0, 40.0],
        )
        .unwrap();
        let sub = ds.subset(&[0, 3]).unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.targets, [10.0, 40.0]);
        assert_eq!(sub.binned().n_bins(0), 2);
        assert_eq!(sub.target_mean(), 25.0);
    }
}
