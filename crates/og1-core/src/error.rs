// crates/og1-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("required variable '{field}' is missing during {stage}")]
    MissingField { field: String, stage: &'static str },

    #[error("no dive number column found (looked for dive_number, divenum, dive_num)")]
    MissingDiveNumber,

    #[error("no measurement group could be identified among dimension signatures {found:?}")]
    MissingMeasurementAxis { found: Vec<String> },

    #[error("column '{column}' has length {found}, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Data processing error: {0}")]
    Processing(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
