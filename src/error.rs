//! Error types for the trainer.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Everything that can stop a training run.
///
/// Precondition variants are raised before any network, log or checkpoint
/// is touched. I/O variants raised inside the loop are reported, not fatal.
#[derive(Error, Debug)]
pub enum TrainError {
    /// The price series cannot cover the first window plus one step.
    #[error("price series has {len} samples, need at least {required}")]
    SeriesTooShort { len: usize, required: usize },

    /// Returns are undefined for non-positive or non-finite prices.
    #[error("price {value} at index {index} is not a positive finite number")]
    InvalidPrice { index: usize, value: f64 },

    /// The auxiliary series is missing or shorter than the price series.
    #[error("auxiliary series mismatch: {0}")]
    AuxiliaryMismatch(String),

    #[error("batch size {batch_size} exceeds replay capacity {capacity}")]
    BatchExceedsCapacity { batch_size: usize, capacity: usize },

    /// Malformed layer shape chain.
    #[error("invalid network shape: {0}")]
    Shape(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A null or non-numeric cell in the price column.
    #[error("column '{column}' has no value at row {row}")]
    MissingPrice { column: String, row: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Polars(#[from] PolarsError),
}

impl TrainError {
    pub fn shape(message: impl Into<String>) -> Self {
        TrainError::Shape(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        TrainError::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, TrainError>;
