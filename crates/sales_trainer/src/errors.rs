use salescast_core::SalesError;
use thiserror::Error;

/// Errors returned by training, search and selection.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error(transparent)]
    Core(#[from] SalesError),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("hyperparameter search exhausted: all {attempted} sampled combinations failed")]
    SearchExhausted { attempted: usize },

    #[error("no model family produced a model")]
    NoModelsTrained,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrainerError>;
