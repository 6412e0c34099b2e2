//! End-to-end training pipeline
//!
//! Ingested records → split → derived features → preprocessing → per-family
//! training → evaluation → selection. Each stage is fully materialised
//! before the next begins; parallelism lives inside the search and the
//! forests.

use crate::config::TrainerConfig;
use crate::dataset::Dataset;
use crate::deterministic::data_fingerprint;
use crate::errors::{Result, TrainerError};
use crate::evaluation::{evaluate, select_best};
use crate::forest::ForestTrainer;
use crate::report::{
    FamilyFailure, IngestSummary, ModelSummary, SearchSummary, SplitSummary, TrainingReport,
    REPORT_NAME,
};
use crate::search::RandomizedSearch;
use crate::split::train_test_split;
use chrono::Utc;
use salescast_core::store::SavedArtifact;
use salescast_core::{
    col, engineer_features, ArtifactStore, CompositePreprocessor, DerivedFeatureStats,
    Hyperparameters, IngestReport, ModelFamily, SalesError, Table, TrainedModel,
};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// Everything a training run produces
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub preprocessor: CompositePreprocessor,
    pub derived: DerivedFeatureStats,
    /// Trained models in family order
    pub models: Vec<TrainedModel>,
    pub report: TrainingReport,
}

impl TrainingRun {
    pub fn best(&self) -> Option<&TrainedModel> {
        let family = self.report.best?;
        self.models.iter().find(|m| m.family == family)
    }
}

/// Artifacts and report written by [`TrainingPipeline::run_and_save`]
#[derive(Debug, Clone)]
pub struct SavedRun {
    pub run: TrainingRun,
    pub artifacts: Vec<SavedArtifact>,
    pub report_path: PathBuf,
}

pub struct TrainingPipeline {
    config: TrainerConfig,
}

/// Model-ready partitions
struct Prepared {
    preprocessor: CompositePreprocessor,
    derived: DerivedFeatureStats,
    train: Dataset,
    eval_features: Vec<Vec<f64>>,
    eval_targets: Vec<f64>,
}

/// One family's trained ensemble before evaluation
struct FamilyOutput {
    model: TrainedModel,
    search: Option<SearchSummary>,
}

impl TrainingPipeline {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train and evaluate every configured family on `ingest`
    #[instrument(skip_all, fields(rows = ingest.accepted_count(), seed = self.config.seed))]
    pub fn run(&self, ingest: &IngestReport) -> Result<TrainingRun> {
        ingest.ensure_not_empty()?;
        let ingest_summary = IngestSummary::from_ingest(ingest);
        ingest_summary.log();

        let prepared = self.prepare(ingest)?;
        let feature_names = prepared.preprocessor.feature_names()?;
        info!(
            "Prepared {} training and {} evaluation rows with {} features",
            prepared.train.len(),
            prepared.eval_targets.len(),
            feature_names.len()
        );

        let mut models = Vec::new();
        let mut failures = Vec::new();
        let mut search = None;

        for family in self.config.training_families() {
            let trained = self.train_family(family, &prepared.train).and_then(|output| {
                let metrics = evaluate(
                    &output.model,
                    &prepared.eval_features,
                    &prepared.eval_targets,
                )?;
                Ok((output, metrics))
            });
            match trained {
                Ok((output, metrics)) => {
                    info!(
                        "{}: RMSE {:.4}, R² {:.4}",
                        family.display_name(),
                        metrics.rmse,
                        metrics.r2
                    );
                    if output.search.is_some() {
                        search = output.search;
                    }
                    models.push(TrainedModel {
                        metrics: Some(metrics),
                        ..output.model
                    });
                }
                Err(e) => {
                    warn!("{} failed: {}", family.display_name(), e);
                    failures.push(FamilyFailure {
                        family,
                        error: e.to_string(),
                    });
                }
            }
        }

        if models.is_empty() {
            return Err(TrainerError::NoModelsTrained);
        }
        let best = select_best(&models).map(|m| m.family);

        let report = TrainingReport {
            created_at: Utc::now(),
            salescast_version: crate::VERSION.to_string(),
            seed: self.config.seed,
            leakage_policy: self.config.features.leakage_policy,
            ingest: ingest_summary,
            split: SplitSummary {
                train_rows: prepared.train.len(),
                eval_rows: prepared.eval_targets.len(),
            },
            data_fingerprint: data_fingerprint(&prepared.train.features, &prepared.train.targets),
            feature_names,
            models: models.iter().filter_map(ModelSummary::from_model).collect(),
            failures,
            search,
            best,
        };
        report.log_summary();

        Ok(TrainingRun {
            preprocessor: prepared.preprocessor,
            derived: prepared.derived,
            models,
            report,
        })
    }

    /// [`run`](Self::run), then persist every artifact and the report
    pub fn run_and_save(&self, ingest: &IngestReport, store: &ArtifactStore) -> Result<SavedRun> {
        let run = self.run(ingest)?;
        let artifacts = store.save(&run.preprocessor, &run.derived, &run.models)?;
        let report_path = store.save_json(REPORT_NAME, &run.report)?;
        info!("Report written to {}", report_path.display());
        Ok(SavedRun {
            run,
            artifacts,
            report_path,
        })
    }

    fn prepare(&self, ingest: &IngestReport) -> Result<Prepared> {
        let table = Table::from_records(&ingest.records);
        if table.n_rows() < 2 {
            return Err(SalesError::NoTrainingRows {
                excluded: ingest.skipped_count(),
            }
            .into());
        }

        // Role columns must exist before anything is fitted.
        let derived_columns = [col::TOTAL_KNOWN_SALES, col::PUBLISHER_AVG, col::PLATFORM_COUNT];
        if let Some(missing) = self
            .config
            .features
            .roles
            .all_columns()
            .find(|c| !table.has_column(c) && !derived_columns.contains(c))
        {
            return Err(SalesError::ColumnMissing(missing.to_string()).into());
        }

        let split = train_test_split(table.n_rows(), self.config.split.test_fraction, self.config.seed)?;
        let (augmented, derived) = engineer_features(
            &table,
            col::GLOBAL_SALES,
            &split.train,
            self.config.features.leakage_policy,
        )?;

        let train_table = augmented.take_rows(&split.train);
        let eval_table = augmented.take_rows(&split.eval);
        let train_targets = train_table.numeric(col::GLOBAL_SALES)?.to_vec();
        let eval_targets = eval_table.numeric(col::GLOBAL_SALES)?.to_vec();

        let mut preprocessor = CompositePreprocessor::with_target_config(
            self.config.features.roles.clone(),
            self.config.features.target_encoding,
        );
        let train_features = preprocessor.fit_transform(&train_table, &train_targets)?;
        let eval_features = preprocessor.transform(&eval_table)?;

        Ok(Prepared {
            preprocessor,
            derived,
            train: Dataset::new(train_features, train_targets)?,
            eval_features,
            eval_targets,
        })
    }

    fn train_family(&self, family: ModelFamily, train: &Dataset) -> Result<FamilyOutput> {
        let seed = self.config.seed;
        match family {
            ModelFamily::Gbdt => {
                let outcome = RandomizedSearch::new(
                    self.config.boosting_space.clone(),
                    self.config.search_settings(),
                )
                .run(train)?;
                let search = SearchSummary {
                    attempted: outcome.trials.len(),
                    succeeded: outcome.succeeded(),
                    best_score: outcome.best_score,
                };
                Ok(FamilyOutput {
                    model: TrainedModel {
                        family,
                        ensemble: outcome.model,
                        hyperparameters: Hyperparameters::Gbdt(outcome.best_params),
                        cv_score: Some(outcome.best_score),
                        metrics: None,
                    },
                    search: Some(search),
                })
            }
            ModelFamily::RandomForest | ModelFamily::ExtraTrees => {
                let params = if family == ModelFamily::RandomForest {
                    self.config.forest.random_forest
                } else {
                    self.config.forest.extra_trees
                };
                let ensemble = ForestTrainer::new(params, seed).train(train)?;
                Ok(FamilyOutput {
                    model: TrainedModel {
                        family,
                        ensemble,
                        hyperparameters: Hyperparameters::Forest(params),
                        cv_score: None,
                        metrics: None,
                    },
                    search: None,
                })
            }
        }
    }
}
