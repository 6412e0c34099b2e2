//! Randomized hyperparameter search for gradient boosting
//!
//! Samples distinct combinations from a discrete grid, scores each by
//! negative mean squared error under k-fold cross-validation, and refits the
//! best one on the full training set. Trials run in parallel; each gets its
//! own seed and reads the shared fold datasets without mutating them.

use crate::boosting::GbdtTrainer;
use crate::dataset::Dataset;
use crate::deterministic::{derive_seed, seeded_rng};
use crate::errors::{Result, TrainerError};
use crate::evaluation::mean_squared_error;
use crate::split::KFold;
use rand::seq::index;
use rayon::prelude::*;
use salescast_core::model::{GbdtParams, TreeEnsemble};
use salescast_core::Regressor;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Discrete grid of boosting hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingSpace {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub subsample: Vec<f64>,
    pub colsample_bytree: Vec<f64>,
    pub min_child_weight: Vec<f64>,
    pub reg_alpha: Vec<f64>,
    pub reg_lambda: Vec<f64>,
}

impl Default for BoostingSpace {
    fn default() -> Self {
        Self {
            n_estimators: vec![200, 300, 400, 500],
            max_depth: vec![4, 5, 6, 7],
            learning_rate: vec![0.02, 0.03, 0.05, 0.08],
            subsample: vec![0.8, 0.9, 1.0],
            colsample_bytree: vec![0.8, 0.9, 1.0],
            min_child_weight: vec![1.0, 3.0, 5.0],
            reg_alpha: vec![0.0, 0.1, 0.5],
            reg_lambda: vec![1.0, 1.5, 2.0],
        }
    }
}

impl BoostingSpace {
    /// A space holding exactly one combination
    pub fn single(params: GbdtParams) -> Self {
        Self {
            n_estimators: vec![params.n_estimators],
            max_depth: vec![params.max_depth],
            learning_rate: vec![params.learning_rate],
            subsample: vec![params.subsample],
            colsample_bytree: vec![params.colsample_bytree],
            min_child_weight: vec![params.min_child_weight],
            reg_alpha: vec![params.reg_alpha],
            reg_lambda: vec![params.reg_lambda],
        }
    }

    fn dimensions(&self) -> [usize; 8] {
        [
            self.n_estimators.len(),
            self.max_depth.len(),
            self.learning_rate.len(),
            self.subsample.len(),
            self.colsample_bytree.len(),
            self.min_child_weight.len(),
            self.reg_alpha.len(),
            self.reg_lambda.len(),
        ]
    }

    /// Number of combinations in the grid
    pub fn size(&self) -> Result<usize> {
        self.dimensions().iter().try_fold(1usize, |acc, &d| {
            if d == 0 {
                return Err(TrainerError::InvalidParameters(
                    "every boosting search dimension needs at least one value".into(),
                ));
            }
            acc.checked_mul(d)
                .ok_or_else(|| TrainerError::InvalidParameters("search space too large".into()))
        })
    }

    /// Decode combination `index` (mixed radix, last dimension fastest)
    pub fn combination(&self, mut index: usize) -> GbdtParams {
        let mut digits = [0usize; 8];
        let dims = self.dimensions();
        for pos in (0..8).rev() {
            digits[pos] = index % dims[pos];
            index /= dims[pos];
        }
        GbdtParams {
            n_estimators: self.n_estimators[digits[0]],
            max_depth: self.max_depth[digits[1]],
            learning_rate: self.learning_rate[digits[2]],
            subsample: self.subsample[digits[3]],
            colsample_bytree: self.colsample_bytree[digits[4]],
            min_child_weight: self.min_child_weight[digits[5]],
            reg_alpha: self.reg_alpha[digits[6]],
            reg_lambda: self.reg_lambda[digits[7]],
        }
    }
}

/// Search budget and cross-validation settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub iterations: usize,
    pub folds: usize,
    pub seed: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            iterations: 25,
            folds: 5,
            seed: 42,
        }
    }
}

/// Outcome of one sampled combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Position in sampling order; lower wins ties
    pub trial: usize,
    pub params: GbdtParams,
    /// Negative MSE per fold; empty when the trial failed
    pub fold_scores: Vec<f64>,
    pub mean_score: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best_params: GbdtParams,
    pub best_score: f64,
    pub trials: Vec<TrialResult>,
    /// Best combination refit on the full training set
    pub model: TreeEnsemble,
}

impl SearchOutcome {
    pub fn succeeded(&self) -> usize {
        self.trials.iter().filter(|t| t.mean_score.is_some()).count()
    }
}

struct FoldData {
    train: Dataset,
    validation: Dataset,
}

pub struct RandomizedSearch {
    space: BoostingSpace,
    settings: SearchSettings,
}

impl RandomizedSearch {
    pub fn new(space: BoostingSpace, settings: SearchSettings) -> Self {
        Self { space, settings }
    }

    /// Distinct grid indices in sampling order
    pub fn sample_combinations(&self) -> Result<Vec<usize>> {
        let size = self.space.size()?;
        let amount = self.settings.iterations.min(size);
        if amount == 0 {
            return Err(TrainerError::InvalidParameters(
                "search needs at least one iteration".into(),
            ));
        }
        let mut rng = seeded_rng(self.settings.seed);
        Ok(index::sample(&mut rng, size, amount).into_vec())
    }

    #[instrument(skip_all, fields(rows = dataset.len(), iterations = self.settings.iterations, folds = self.settings.folds))]
    pub fn run(&self, dataset: &Dataset) -> Result<SearchOutcome> {
        let sampled = self.sample_combinations()?;
        let folds = KFold::new(self.settings.folds, self.settings.seed)
            .split(dataset.len())?
            .into_iter()
            .map(|fold| -> Result<FoldData> {
                Ok(FoldData {
                    train: dataset.subset(&fold.train)?,
                    validation: dataset.subset(&fold.validation)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Searching {} combinations with {}-fold cross-validation",
            sampled.len(),
            folds.len()
        );

        let trials: Vec<TrialResult> = sampled
            .par_iter()
            .enumerate()
            .map(|(trial, &combination)| {
                let params = self.space.combination(combination);
                let seed = derive_seed(self.settings.seed, trial as u64);
                match cross_validate(&params, seed, &folds) {
                    Ok(fold_scores) => {
                        let mean = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
                        debug!("Trial {} scored {:.6}", trial, mean);
                        TrialResult {
                            trial,
                            params,
                            fold_scores,
                            mean_score: Some(mean),
                            error: None,
                        }
                    }
                    Err(e) => {
                        warn!("Trial {} failed: {}", trial, e);
                        TrialResult {
                            trial,
                            params,
                            fold_scores: Vec::new(),
                            mean_score: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect();

        let best = best_trial(&trials).ok_or(TrainerError::SearchExhausted {
            attempted: trials.len(),
        })?;
        let (best_params, best_score) = (best.params, best.mean_score.unwrap_or(f64::NEG_INFINITY));
        info!(
            "Best combination (trial {}): score {:.6}, {:?}",
            best.trial, best_score, best_params
        );

        let model = GbdtTrainer::new(best_params, self.settings.seed).train(dataset)?;

        Ok(SearchOutcome {
            best_params,
            best_score,
            trials,
            model,
        })
    }
}

/// Negative MSE of `params` on every fold
fn cross_validate(params: &GbdtParams, seed: u64, folds: &[FoldData]) -> Result<Vec<f64>> {
    let trainer = GbdtTrainer::new(*params, seed);
    folds
        .iter()
        .map(|fold| -> Result<f64> {
            let model = trainer.train(&fold.train)?;
            let predictions = model.predict_batch(&fold.validation.features)?;
            let score = -mean_squared_error(&fold.validation.targets, &predictions);
            if score.is_finite() {
                Ok(score)
            } else {
                Err(TrainerError::Training("non-finite fold score".into()))
            }
        })
        .collect()
}

/// Highest mean score; the earliest trial wins ties
pub fn best_trial(trials: &[TrialResult]) -> Option<&TrialResult> {
    let mut best: Option<(&TrialResult, f64)> = None;
    for trial in trials {
        if let Some(score) = trial.mean_score {
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((trial, score));
            }
        }
    }
    best.map(|(trial, _)| trial)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(trial: usize, score: Option<f64>) -> TrialResult {
        TrialResult {
            trial,
            params: GbdtParams::default(),
            fold_scores: Vec::new(),
            mean_score: score,
            error: None,
        }
    }

    #[test]
    fn test_default_space_size() {
        assert_eq!(BoostingSpace::default().size().unwrap(), 4 * 4 * 4 * 3 * 3 * 3 * 3 * 3);
    }

    #[test]
    fn test_combination_decoding_covers_grid() {
        let space = BoostingSpace::default();
        let first = space.combination(0);
        assert_eq!(first.n_estimators, 200);
        assert_eq!(first.reg_lambda, 1.0);

        let last = space.combination(space.size().unwrap() - 1);
        assert_eq!(last.n_estimators, 500);
        assert_eq!(last.max_depth, 7);
        assert_eq!(last.reg_lambda, 2.0);

        // Last dimension varies fastest.
        assert_eq!(space.combination(1).reg_lambda, 1.5);
    }

    #[test]
    fn test_sampling_is_distinct_and_seeded() {
        let search = RandomizedSearch::new(BoostingSpace::default(), SearchSettings::default());
        let a = search.sample_combinations().unwrap();
        assert_eq!(a.len(), 25);
        let mut unique = a.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 25);
        assert_eq!(a, search.sample_combinations().unwrap());
    }

    #[test]
    fn test_sampling_is_capped_by_space() {
        let space = BoostingSpace::single(GbdtParams::default());
        let search = RandomizedSearch::new(space, SearchSettings::default());
        assert_eq!(search.sample_combinations().unwrap(), [0]);
    }

    #[test]
    fn test_empty_dimension_is_rejected() {
        let space = BoostingSpace {
            max_depth: vec![],
            ..BoostingSpace::default()
        };
        assert!(space.size().is_err());
    }

    #[test]
    fn test_best_trial_prefers_earliest_on_tie() {
        let trials = vec![
            trial(0, Some(-2.0)),
            trial(1, None),
            trial(2, Some(-1.0)),
            trial(3, Some(-1.0)),
        ];
        assert_eq!(best_trial(&trials).unwrap().trial, 2);
        assert!(best_trial(&[trial(0, None)]).is_none());
    }
}
