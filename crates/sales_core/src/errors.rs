//! Error types for the salescast core crate

use thiserror::Error;

/// Errors raised by ingestion, preprocessing and artifact storage
#[derive(Error, Debug)]
pub enum SalesError {
    /// A declared column is absent from the input table
    #[error("Column missing from table: {0}")]
    ColumnMissing(String),

    /// A column exists but holds the wrong kind of values for its role
    #[error("Column {column} has wrong type: expected {expected}")]
    ColumnTypeMismatch {
        column: String,
        expected: &'static str,
    },

    /// A column appears in more than one role set
    #[error("Invalid column roles: {0}")]
    InvalidColumnRoles(String),

    /// Transform requested before fit
    #[error("Preprocessor not fitted (call fit first)")]
    NotFitted,

    /// Inputs violate a precondition (length mismatch, empty table, ...)
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Row exclusion left nothing to train on
    #[error("No training rows left after excluding {excluded} malformed rows")]
    NoTrainingRows { excluded: usize },

    /// Load of an artifact that was never saved
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    /// Persisted artifact failed its integrity check
    #[error("Artifact {name} is corrupted: {reason}")]
    ArtifactCorrupted { name: String, reason: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary artifact encoding error
    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, SalesError>;
