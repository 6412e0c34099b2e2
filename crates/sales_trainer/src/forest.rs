//! Bagged regression forests
//!
//! Random forest and extremely randomized trees share this trainer; they
//! differ only in [`ForestParams::bootstrap`] and
//! [`ForestParams::split_strategy`]. Trees are grown in parallel, each from
//! its own seed derived from the run seed and the tree index.

use crate::cart::{TreeConfig, TreeGrower};
use crate::dataset::Dataset;
use crate::deterministic::{derive_seed, seeded_rng};
use crate::errors::Result;
use rand::Rng;
use rayon::prelude::*;
use salescast_core::model::{Aggregation, ForestParams, TreeEnsemble};
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct ForestTrainer {
    params: ForestParams,
    seed: u64,
}

impl ForestTrainer {
    pub fn new(params: ForestParams, seed: u64) -> Self {
        Self { params, seed }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    #[instrument(skip(self, dataset), fields(trees = self.params.n_estimators, rows = dataset.len()))]
    pub fn train(&self, dataset: &Dataset) -> Result<TreeEnsemble> {
        self.params.validate()?;

        let n_samples = dataset.len();
        let feature_count = dataset.feature_count;
        let tree_config = TreeConfig {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            min_child_weight: 0.0,
            reg_alpha: 0.0,
            reg_lambda: 0.0,
            max_features: Some(self.params.max_features.resolve(feature_count)),
            split_strategy: self.params.split_strategy,
        };

        // With hessian 1 and no regularization each leaf is its mean target.
        let gradients: Vec<f64> = dataset.targets.iter().map(|y| -y).collect();
        let hessians = vec![1.0; n_samples];
        let all_features: Vec<usize> = (0..feature_count).collect();

        let trees = (0..self.params.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = seeded_rng(derive_seed(self.seed, tree_idx as u64));
                let rows: Vec<usize> = if self.params.bootstrap {
                    let mut drawn: Vec<usize> =
                        (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                    drawn.sort_unstable();
                    drawn
                } else {
                    (0..n_samples).collect()
                };
                TreeGrower::new(dataset.binned(), &gradients, &hessians, &tree_config).grow(
                    rows,
                    &all_features,
                    &mut rng,
                )
            })
            .collect::<Vec<_>>();

        debug!(
            "Grew {} trees, mean depth {:.1}",
            trees.len(),
            trees.iter().map(|t| t.depth()).sum::<usize>() as f64 / trees.len() as f64
        );

        Ok(TreeEnsemble {
            trees,
            base_score: dataset.target_mean(),
            aggregation: Aggregation::Mean,
            feature_count,
        })
    }
}
