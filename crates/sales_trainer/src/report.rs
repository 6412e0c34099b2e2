//! Training report
//!
//! Everything a run produced besides the artifacts themselves: ingest
//! counts, split sizes, per-family metrics and the winning model. Persisted
//! as canonical JSON next to the artifacts.

use chrono::{DateTime, Utc};
use salescast_core::{
    EvaluationMetrics, Hyperparameters, IngestReport, LeakagePolicy, ModelFamily, TrainedModel,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Artifact-store name of the persisted report
pub const REPORT_NAME: &str = "report";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub accepted: usize,
    pub skipped: usize,
    pub skipped_by_reason: BTreeMap<String, usize>,
    pub distinct_platforms: usize,
    pub distinct_genres: usize,
    pub distinct_publishers: usize,
}

impl IngestSummary {
    pub fn from_ingest(ingest: &IngestReport) -> Self {
        let distinct = |f: fn(&salescast_core::SalesRecord) -> &str| {
            ingest.records.iter().map(f).collect::<BTreeSet<_>>().len()
        };
        Self {
            accepted: ingest.accepted_count(),
            skipped: ingest.skipped_count(),
            skipped_by_reason: ingest.skipped_by_reason(),
            distinct_platforms: distinct(|r| r.platform.as_str()),
            distinct_genres: distinct(|r| r.genre.as_str()),
            distinct_publishers: distinct(|r| r.publisher.as_str()),
        }
    }

    pub fn log(&self) {
        info!(
            "Ingested {} rows ({} skipped): {} platforms, {} genres, {} publishers",
            self.accepted,
            self.skipped,
            self.distinct_platforms,
            self.distinct_genres,
            self.distinct_publishers
        );
        for (reason, count) in &self.skipped_by_reason {
            info!("  skipped {}: {}", reason, count);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub train_rows: usize,
    pub eval_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    /// Mean cross-validated negative MSE of the winning combination
    pub best_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub family: ModelFamily,
    pub rmse: f64,
    pub r2: f64,
    pub cv_score: Option<f64>,
    pub hyperparameters: Hyperparameters,
}

impl ModelSummary {
    /// `None` for models that were never evaluated
    pub fn from_model(model: &TrainedModel) -> Option<Self> {
        let EvaluationMetrics { rmse, r2 } = model.metrics?;
        Some(Self {
            family: model.family,
            rmse,
            r2,
            cv_score: model.cv_score,
            hyperparameters: model.hyperparameters.clone(),
        })
    }
}

/// A family that produced no model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyFailure {
    pub family: ModelFamily,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub created_at: DateTime<Utc>,
    pub salescast_version: String,
    pub seed: u64,
    pub leakage_policy: LeakagePolicy,
    pub ingest: IngestSummary,
    pub split: SplitSummary,
    /// blake3 digest of the training features and targets
    pub data_fingerprint: String,
    pub feature_names: Vec<String>,
    pub models: Vec<ModelSummary>,
    pub failures: Vec<FamilyFailure>,
    pub search: Option<SearchSummary>,
    pub best: Option<ModelFamily>,
}

impl TrainingReport {
    pub fn model(&self, family: ModelFamily) -> Option<&ModelSummary> {
        self.models.iter().find(|m| m.family == family)
    }

    pub fn best_model(&self) -> Option<&ModelSummary> {
        self.best.and_then(|family| self.model(family))
    }

    pub fn log_summary(&self) {
        info!(
            "Training summary: {} train rows, {} eval rows, {} features",
            self.split.train_rows,
            self.split.eval_rows,
            self.feature_names.len()
        );
        for model in &self.models {
            info!(
                "  {:<24} RMSE {:.4}  R² {:.4}",
                model.family.display_name(),
                model.rmse,
                model.r2
            );
            if let (Hyperparameters::Gbdt(params), Some(cv)) =
                (&model.hyperparameters, model.cv_score)
            {
                info!("    best search params (cv score {:.6}): {:?}", cv, params);
            }
        }
        for failure in &self.failures {
            warn!("  {} failed: {}", failure.family.display_name(), failure.error);
        }
        match self.best_model() {
            Some(best) => info!(
                "Best model: {} (R² {:.4})",
                best.family.display_name(),
                best.r2
            ),
            None => warn!("No model could be selected"),
        }
    }
}
