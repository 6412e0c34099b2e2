//! salescast trainer - reproducible tree-ensemble training and selection
//!
//! Fits gradient-boosted trees (randomized search with k-fold
//! cross-validation), a random forest and extremely randomized trees on the
//! preprocessed sales table, evaluates each on a held-out partition and
//! picks the best by R².

pub mod binning;
pub mod boosting;
pub mod cart;
pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod evaluation;
pub mod forest;
pub mod pipeline;
pub mod report;
pub mod search;
pub mod split;

use salescast_core::{load_csv, ArtifactStore};
use std::path::Path;

pub use boosting::GbdtTrainer;
pub use config::{ConfigManager, TrainerConfig};
pub use dataset::Dataset;
pub use errors::{Result, TrainerError};
pub use evaluation::{evaluate, r2_score, rmse, select_best};
pub use forest::ForestTrainer;
pub use pipeline::{SavedRun, TrainingPipeline, TrainingRun};
pub use report::TrainingReport;
pub use search::{BoostingSpace, RandomizedSearch, SearchOutcome, SearchSettings};
pub use split::{train_test_split, KFold};

/// Train every configured family from a sales CSV and persist the results
/// under `config.artifacts.directory`.
pub fn train_from_csv(path: &Path, config: TrainerConfig) -> Result<SavedRun> {
    let ingest = load_csv(path)?;
    let store = ArtifactStore::open(config.artifacts.directory.clone())?;
    TrainingPipeline::new(config).run_and_save(&ingest, &store)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
