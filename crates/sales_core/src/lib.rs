//! salescast core
//!
//! Data-side building blocks of the game-sales model:
//! - CSV ingestion with per-row validation ([`record`])
//! - Derived sales features ([`feature_engineering`])
//! - The fit-once/apply-many [`CompositePreprocessor`]
//! - Tree-ensemble model representation ([`model`])
//! - Durable, integrity-checked [`ArtifactStore`]

pub mod errors;
pub mod feature_engineering;
pub mod model;
pub mod preprocessor;
pub mod record;
pub mod serialization;
pub mod store;
pub mod table;

pub use errors::{Result, SalesError};
pub use feature_engineering::{engineer_features, DerivedFeatureStats, LeakagePolicy};
pub use model::{
    Aggregation, EvaluationMetrics, ForestParams, GbdtParams, Hyperparameters, ModelFamily,
    Regressor, TrainedModel, TreeEnsemble,
};
pub use preprocessor::{ColumnRoles, CompositePreprocessor};
pub use record::{load_csv, read_csv, IngestReport, RowOutcome, SalesRecord, SkipReason};
pub use store::ArtifactStore;
pub use table::{col, Column, Table};

/// Predict global sales for one raw record with persisted artifacts
pub fn predict_record(
    preprocessor: &CompositePreprocessor,
    derived: &DerivedFeatureStats,
    model: &impl Regressor,
    record: &SalesRecord,
) -> Result<f64> {
    let features = preprocessor.transform_record(record, derived)?;
    model.predict(&features)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
