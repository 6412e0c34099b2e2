//! Train/evaluation splits and k-fold cross-validation

use crate::deterministic::seeded_rng;
use crate::errors::{Result, TrainerError};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Row indices of the two partitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub eval: Vec<usize>,
}

/// Shuffle `0..n_rows` with `seed` and hold out `ceil(test_fraction * n)` rows
///
/// Both partitions are guaranteed non-empty.
pub fn train_test_split(n_rows: usize, test_fraction: f64, seed: u64) -> Result<TrainTestSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TrainerError::InvalidParameters(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    let n_eval = (test_fraction * n_rows as f64).ceil() as usize;
    if n_eval == 0 || n_eval >= n_rows {
        return Err(TrainerError::Dataset(format!(
            "{n_rows} rows cannot be split into non-empty train and evaluation partitions"
        )));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    indices.shuffle(&mut seeded_rng(seed));
    let train = indices.split_off(n_eval);

    Ok(TrainTestSplit {
        train,
        eval: indices,
    })
}

/// One cross-validation fold, as positions into the split rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Shuffled k-fold splitter
///
/// The first `n % k` folds hold one extra validation row.
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    pub n_splits: usize,
    pub seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    pub fn split(&self, n_rows: usize) -> Result<Vec<Fold>> {
        if self.n_splits < 2 {
            return Err(TrainerError::InvalidParameters(format!(
                "k-fold needs at least 2 splits, got {}",
                self.n_splits
            )));
        }
        if n_rows < self.n_splits {
            return Err(TrainerError::Dataset(format!(
                "cannot make {} folds from {} rows",
                self.n_splits, n_rows
            )));
        }

        let mut order: Vec<usize> = (0..n_rows).collect();
        order.shuffle(&mut seeded_rng(self.seed));

        let base = n_rows / self.n_splits;
        let extra = n_rows % self.n_splits;
        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for k in 0..self.n_splits {
            let size = base + usize::from(k < extra);
            let end = start + size;
            let mut validation = order[start..end].to_vec();
            let mut train: Vec<usize> = order[..start].iter().chain(&order[end..]).copied().collect();
            validation.sort_unstable();
            train.sort_unstable();
            folds.push(Fold { train, validation });
            start = end;
        }
        Ok(folds)
    }
}
