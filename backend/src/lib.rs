//! # Census - South Sudan 2008 census cleaning and summaries
//!
//! Census turns the raw South Sudan 2008 census export into grouped
//! population totals, and those totals into labelled summaries.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│   Cleaner    │────▶│  Summarizer  │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (tweak_census│     │ (+ millions  │
//! └─────────────┘     └─────────────┘     │  grouped)    │     │   label)     │
//!                                         └──────────────┘     └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use census::{parse_csv_file_auto, summarize_census, tweak_census, Condition, RawTable};
//!
//! let raw = RawTable::from(parse_csv_file_auto("ss-census.csv")?);
//! let by_region = tweak_census(&raw, &["former_region", "gender"], &Condition::exclude_totals())?;
//! let summary = summarize_census(&by_region, &["former_region"])?;
//! println!("{}", summary);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain vocabularies (gender, age buckets, former regions)
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Conditions, cleaner, summarizer and pipeline
//! - [`validation`] - Output schema validation
//! - [`config`] - Environment settings
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CensusError, CensusResult, ConditionError, ConfigError, PipelineError, PipelineResult, ServerError,
    ServerResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    age_category, CensusRecord, Dimension, FormerRegion, Gender, AGE_BUCKETS, REGION_RULES, REQUIRED_COLUMNS,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{
    is_valid, is_valid_cleaned_record, is_valid_summary_record, validate, validate_cleaned_record,
    validate_summary_record,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    csv_to_json, decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv, parse_csv_file,
    parse_csv_file_auto, CsvError, ParseResult,
};

// =============================================================================
// Re-exports - Cleaner & Summarizer
// =============================================================================

pub use transform::{
    clean_records, millions_label, summarize_census, tweak_census, tweak_census_with_stats, CensusRow, CensusTable,
    CleanStats, Condition, Field, Literal, RawTable, RowPredicate, RowView,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    process_bytes, process_csv, run_pipeline, CsvInfo, PipelineOptions, PipelineOutput, ValidationReport,
};

pub use config::Settings;

/// Pipeline entry points under a short path.
pub mod pipeline {
    pub use crate::transform::pipeline::*;
}

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, CensusResponse, CsvMetadata, ResponseMetadata, RowStats, ValidationStats};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
