//! Error types for the census pipeline.
//!
//! Errors are layered the same way the pipeline is:
//!
//! - [`CsvError`] - CSV parsing errors (line-aware, defined in [`crate::parser`])
//! - [`CensusError`] - Schema, grouping and value errors from the cleaner and summarizer
//! - [`ConditionError`] - Row condition parsing errors
//! - [`ConfigError`] - Environment configuration errors
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP API errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

pub use crate::parser::CsvError;

// =============================================================================
// Census Errors
// =============================================================================

/// Errors raised by [`crate::tweak_census`] and [`crate::summarize_census`].
///
/// Any of these aborts the whole call; there are no partial results.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CensusError {
    /// Required source columns are absent from the input.
    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// A grouping column does not exist in the transformed schema.
    #[error("Unknown column '{column}' (available: {})", .available.join(", "))]
    InvalidGrouping {
        column: String,
        available: Vec<String>,
    },

    /// The same grouping column was named more than once.
    #[error("Grouping column '{0}' is listed more than once")]
    DuplicateGrouping(String),

    /// No grouping column was given.
    #[error("At least one grouping column is required")]
    EmptyGrouping,

    /// A `Variable Name` value is not of the form `Population, <Gender> (Number)`.
    #[error("Row {row}: unrecognized variable name '{value}'")]
    UnknownVariable { row: usize, value: String },

    /// A cell holds a value of the wrong kind (e.g. a non-numeric population).
    #[error("Row {row}, column '{column}': invalid value '{value}'")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    /// A table handed to the summarizer has no `total` column.
    #[error("Input table has no 'total' column")]
    MissingTotal,
}

// =============================================================================
// Condition Errors
// =============================================================================

/// Errors while building a row condition from text or JSON.
#[derive(Debug, Error)]
pub enum ConditionError {
    /// The clause could not be parsed.
    #[error("Invalid condition '{clause}': {message}")]
    Syntax { clause: String, message: String },

    /// The clause names a column rows do not have at filtering time.
    #[error("Unknown condition column '{0}' (expected state, gender, category or population)")]
    UnknownColumn(String),

    /// JSON condition document could not be decoded.
    #[error("Invalid condition JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while reading settings from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds an unusable value.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::process_csv`].
/// It wraps all lower-level errors and adds pipeline-specific variants.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Cleaning or summarizing error.
    #[error("Census error: {0}")]
    Census(#[from] CensusError),

    /// Condition error.
    #[error("Condition error: {0}")]
    Condition(#[from] ConditionError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing CSV output failed.
    #[error("CSV output error: {0}")]
    CsvWrite(#[from] csv::Error),

    /// No records to process.
    #[error("No records to process")]
    EmptyInput,
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Whether the caller (rather than the server) is at fault.
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::BadRequest(_) => true,
            ServerError::Pipeline(e) => matches!(
                e,
                PipelineError::Csv(_)
                    | PipelineError::Census(_)
                    | PipelineError::Condition(_)
                    | PipelineError::EmptyInput
            ),
            ServerError::Internal(_) => false,
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for cleaning and summarizing.
pub type CensusResult<T> = Result<T, CensusError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // CensusError -> PipelineError
        let census_err = CensusError::MissingColumns(vec!["2008".into()]);
        let pipeline_err: PipelineError = census_err.into();
        assert!(pipeline_err.to_string().contains("2008"));

        // CsvError -> PipelineError -> ServerError
        let csv_err = CsvError::new(1, "Empty CSV file");
        let pipeline_err: PipelineError = csv_err.into();
        let server_err: ServerError = pipeline_err.into();
        assert!(server_err.to_string().contains("Empty"));
        assert!(server_err.is_client_error());
    }

    #[test]
    fn test_invalid_grouping_lists_available_columns() {
        let err = CensusError::InvalidGrouping {
            column: "county".into(),
            available: vec!["state".into(), "gender".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'county'"));
        assert!(msg.contains("state, gender"));
    }

    #[test]
    fn test_missing_columns_joined() {
        let err = CensusError::MissingColumns(vec!["Age Name".into(), "2008".into()]);
        assert_eq!(err.to_string(), "Missing required column(s): Age Name, 2008");
    }

    #[test]
    fn test_internal_error_is_not_client_error() {
        let err = ServerError::Internal("worker panicked".into());
        assert!(!err.is_client_error());
        let io: PipelineError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert!(!ServerError::from(io).is_client_error());
    }
}
