//! REST API types.
//!
//! Tables are returned as arrays of plain row objects, the same shape
//! `census clean` and `census summarize` print as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::transform::pipeline::{PipelineOutput, ValidationReport};

/// Response sent after a census upload has been processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CensusResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready", "warning", "error"
    pub status: String,

    /// When the response was produced (UTC)
    pub generated_at: DateTime<Utc>,

    /// Cleaner output rows
    pub cleaned: Vec<Value>,

    /// Summarizer output rows, if a summary grouping was requested
    pub summary: Option<Vec<Value>>,

    /// Metadata about the run
    pub metadata: ResponseMetadata,
}

/// Metadata about the run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Cleaner grouping columns
    pub grouping: Vec<String>,

    /// Summarizer grouping columns
    pub summary_grouping: Option<Vec<String>>,

    /// Applied row condition, as text
    pub condition: String,

    /// Population across all cleaned groups
    pub total_population: u64,

    pub rows: RowStats,

    pub csv_info: CsvMetadata,

    /// Validation stats, absent when validation was skipped
    pub validation: Option<ValidationStats>,
}

/// Cleaning row counts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowStats {
    pub read: usize,
    pub filtered: usize,
    pub dropped: usize,
    pub kept: usize,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

/// Validation statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStats {
    pub valid: usize,
    pub invalid: usize,
    pub errors: Vec<ValidationError>,
}

/// A validation error
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// "cleaned" or "summary"
    pub table: String,
    pub record_index: usize,
    pub errors: Vec<String>,
}

impl CensusResponse {
    /// Build the response for a finished run.
    pub fn new(
        output: PipelineOutput,
        grouping: Vec<String>,
        summary_grouping: Option<Vec<String>>,
        condition: String,
    ) -> Self {
        let validation = merge_validation(output.validation, output.summary_validation);
        let status = match validation {
            Some(ref v) if v.invalid > 0 => "warning",
            _ => "ready",
        };

        CensusResponse {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            generated_at: Utc::now(),
            cleaned: output.cleaned.to_records(),
            summary: output.summary.as_ref().map(|s| s.to_records()),
            metadata: ResponseMetadata {
                grouping,
                summary_grouping,
                condition,
                total_population: output.cleaned.grand_total(),
                rows: RowStats {
                    read: output.stats.rows_read,
                    filtered: output.stats.rows_filtered,
                    dropped: output.stats.rows_dropped,
                    kept: output.stats.rows_kept(),
                },
                csv_info: CsvMetadata {
                    encoding: output.csv_info.encoding,
                    delimiter: output.csv_info.delimiter.to_string(),
                    row_count: output.csv_info.row_count,
                    columns: output.csv_info.headers,
                },
                validation,
            },
        }
    }
}

fn merge_validation(
    cleaned: Option<ValidationReport>,
    summary: Option<ValidationReport>,
) -> Option<ValidationStats> {
    let reports: Vec<(&str, ValidationReport)> = [("cleaned", cleaned), ("summary", summary)]
        .into_iter()
        .filter_map(|(name, report)| report.map(|r| (name, r)))
        .collect();

    if reports.is_empty() {
        return None;
    }

    let mut stats = ValidationStats { valid: 0, invalid: 0, errors: Vec::new() };
    for (name, report) in reports {
        stats.valid += report.valid;
        stats.invalid += report.invalid;
        stats.errors.extend(report.errors.into_iter().map(|(idx, errs)| ValidationError {
            table: name.to_string(),
            record_index: idx,
            errors: errs,
        }));
    }
    Some(stats)
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "generatedAt": Utc::now(),
        "error": error,
        "cleaned": [],
        "summary": null
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::cleaner::CleanStats;
    use crate::transform::pipeline::CsvInfo;
    use crate::transform::table::{CensusRow, CensusTable};

    fn output(validation: Option<ValidationReport>) -> PipelineOutput {
        let cleaned = CensusTable::new(
            vec!["state".to_string()],
            vec![CensusRow::new(vec!["Unity".to_string()], 2_500_000)],
        );
        PipelineOutput {
            summary: Some(cleaned.clone().with_labels()),
            cleaned,
            stats: CleanStats { rows_read: 4, rows_filtered: 1, rows_dropped: 1 },
            csv_info: CsvInfo {
                encoding: "utf-8".to_string(),
                delimiter: ',',
                headers: vec!["Region Name".to_string()],
                row_count: 4,
            },
            validation,
            summary_validation: None,
        }
    }

    #[test]
    fn test_response_shape() {
        let report = ValidationReport { valid: 1, invalid: 0, errors: vec![] };
        let response = CensusResponse::new(output(Some(report)), vec!["state".into()], None, "all".into());
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "ready");
        assert!(Uuid::parse_str(json["jobId"].as_str().unwrap()).is_ok());
        assert!(json["generatedAt"].is_string());
        assert_eq!(json["cleaned"][0]["state"], "Unity");
        assert_eq!(json["summary"][0]["labels"], 2.5);
        assert_eq!(json["metadata"]["totalPopulation"], 2_500_000);
        assert_eq!(json["metadata"]["rows"]["kept"], 2);
        assert_eq!(json["metadata"]["csvInfo"]["delimiter"], ",");
        assert_eq!(json["metadata"]["validation"]["valid"], 1);
    }

    #[test]
    fn test_invalid_rows_give_warning() {
        let report = ValidationReport { valid: 0, invalid: 1, errors: vec![(0, vec!["bad".into()])] };
        let response = CensusResponse::new(output(Some(report)), vec!["state".into()], None, "all".into());

        assert_eq!(response.status, "warning");
        let validation = response.metadata.validation.unwrap();
        assert_eq!(validation.errors[0].table, "cleaned");
    }

    #[test]
    fn test_skipped_validation() {
        let response = CensusResponse::new(output(None), vec!["state".into()], None, "all".into());
        assert_eq!(response.status, "ready");
        assert!(response.metadata.validation.is_none());
    }

    #[test]
    fn test_error_response() {
        let body = error_response("No file provided");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "No file provided");
        assert!(body["cleaned"].as_array().unwrap().is_empty());
    }
}
