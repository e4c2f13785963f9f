//! Transformation module.
//!
//! This module turns raw census rows into grouped totals:
//! - Condition: Row filters (closures or declarative JSON/text conditions)
//! - Table: Raw and grouped table types
//! - Cleaner: Raw rows to grouped population totals
//! - Summarizer: Re-aggregation with a millions label
//! - Pipeline: Parse, clean, summarize and validate in one call

pub mod cleaner;
pub mod condition;
pub mod pipeline;
pub mod summarizer;
pub mod table;

pub use cleaner::{clean_records, tweak_census, tweak_census_with_stats, CleanStats};
pub use condition::{Condition, Field, Literal, RowPredicate, RowView};
pub use pipeline::*;
pub use summarizer::summarize_census;
pub use table::{millions_label, CensusRow, CensusTable, RawTable, LABELS_COLUMN, TOTAL_COLUMN};
