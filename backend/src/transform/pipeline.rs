//! High-level pipeline API: CSV in, cleaned and summarized tables out.
//!
//! Combines all steps: parsing, cleaning, summarizing and validation.
//!
//! # Example
//!
//! ```rust,ignore
//! use census::pipeline::{process_csv, PipelineOptions};
//! use std::path::Path;
//!
//! let options = PipelineOptions {
//!     grouping: vec!["state".into(), "gender".into()],
//!     summary_grouping: Some(vec!["state".into()]),
//!     ..PipelineOptions::default()
//! };
//! let output = process_csv(Path::new("ss-census.csv"), &options)?;
//! println!("{}", output.summary.unwrap());
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::cleaner::{tweak_census_with_stats, CleanStats};
use super::condition::Condition;
use super::summarizer::summarize_census;
use super::table::{CensusTable, RawTable};
use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::config::Settings;
use crate::error::{PipelineError, PipelineResult};
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, ParseResult};
use crate::validation::{validate_cleaned_record, validate_records, validate_summary_record};

/// Validation error entries kept per table.
const MAX_REPORTED_ERRORS: usize = 10;

/// Options for the census pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineOptions {
    /// Cleaner grouping columns
    pub grouping: Vec<String>,

    /// Summarizer grouping columns; no summary when `None`
    pub summary_grouping: Option<Vec<String>>,

    /// Extra row condition, ANDed with the totals filter
    pub condition: Option<Condition>,

    /// Keep the pre-aggregated `Total` rows
    pub keep_totals: bool,

    /// Skip validation step
    pub skip_validation: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            grouping: settings.grouping.clone(),
            summary_grouping: settings.summary_grouping.clone(),
            condition: None,
            keep_totals: settings.keep_totals,
            skip_validation: false,
        }
    }

    /// Load options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// The condition handed to the cleaner.
    pub fn effective_condition(&self) -> Condition {
        let mut parts = Vec::new();
        if !self.keep_totals {
            parts.push(Condition::exclude_totals());
        }
        if let Some(ref condition) = self.condition {
            parts.push(condition.clone());
        }
        Condition::all_of(parts)
    }
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Schema check results for one table
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: usize,
    pub invalid: usize,
    /// (row index, errors), capped
    pub errors: Vec<(usize, Vec<String>)>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.invalid == 0
    }
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    /// Cleaner output
    pub cleaned: CensusTable,

    /// Summarizer output, when a summary grouping was requested
    pub summary: Option<CensusTable>,

    /// Row counts from the cleaning pass
    pub stats: CleanStats,

    /// CSV parsing metadata
    pub csv_info: CsvInfo,

    /// Cleaned table validation, unless skipped
    pub validation: Option<ValidationReport>,

    /// Summary validation, unless skipped or no summary
    pub summary_validation: Option<ValidationReport>,
}

impl PipelineOutput {
    /// True unless a validation step found invalid rows.
    pub fn is_valid(&self) -> bool {
        self.validation.as_ref().map_or(true, ValidationReport::is_clean)
            && self.summary_validation.as_ref().map_or(true, ValidationReport::is_clean)
    }
}

/// Run the pipeline on a census CSV file.
///
/// 1. Parses the CSV with encoding and delimiter auto-detection
/// 2. Cleans and groups by `options.grouping`
/// 3. Summarizes by `options.summary_grouping`, if set
/// 4. Validates both tables against the output schemas
pub fn process_csv(path: &Path, options: &PipelineOptions) -> PipelineResult<PipelineOutput> {
    log_info(format!("📖 Reading {}...", path.display()));
    let parse_result = parse_csv_file_auto(path)?;
    process_parsed(parse_result, options)
}

/// Same as [`process_csv`] for an in-memory upload.
pub fn process_bytes(bytes: &[u8], options: &PipelineOptions) -> PipelineResult<PipelineOutput> {
    log_info(format!("📖 Reading {} bytes...", bytes.len()));
    let parse_result = parse_bytes_auto(bytes)?;
    process_parsed(parse_result, options)
}

/// Run the pipeline on rows that are already loaded.
pub fn run_pipeline(raw: RawTable, options: &PipelineOptions) -> PipelineResult<PipelineOutput> {
    let csv_info = CsvInfo {
        encoding: "utf-8".to_string(),
        delimiter: ',',
        headers: raw.headers.clone(),
        row_count: raw.len(),
    };
    run_table(raw, csv_info, options)
}

fn process_parsed(parse_result: ParseResult, options: &PipelineOptions) -> PipelineResult<PipelineOutput> {
    log_success(format!("Detected encoding: {}", parse_result.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parse_result.delimiter)));
    log_success(format!("Read {} rows", parse_result.records.len()));

    let csv_info = CsvInfo {
        encoding: parse_result.encoding.clone(),
        delimiter: parse_result.delimiter,
        headers: parse_result.headers.clone(),
        row_count: parse_result.records.len(),
    };

    log_info(format!("📋 CSV has {} columns:", csv_info.headers.len()));
    for (i, col) in csv_info.headers.iter().enumerate() {
        log_info_indent(format!("[{:2}] {}", i + 1, col), 1);
    }

    run_table(RawTable::from(parse_result), csv_info, options)
}

fn run_table(raw: RawTable, csv_info: CsvInfo, options: &PipelineOptions) -> PipelineResult<PipelineOutput> {
    if raw.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let condition = options.effective_condition();
    log_info(format!("🧹 Cleaning by [{}]", options.grouping.join(", ")));
    log_info_indent(format!("where {}", condition), 1);
    let (cleaned, stats) = tweak_census_with_stats(&raw, &options.grouping, &condition)?;

    let summary = match options.summary_grouping {
        Some(ref cols) => {
            log_info(format!("📊 Summarizing by [{}]", cols.join(", ")));
            Some(summarize_census(&cleaned, cols)?)
        }
        None => None,
    };

    let (validation, summary_validation) = if options.skip_validation {
        log_info("(validation skipped)");
        (None, None)
    } else {
        log_info("✔️  Validating output...");
        let cleaned_report = check_table(&cleaned, "cleaned", validate_cleaned_record);
        let summary_report = summary
            .as_ref()
            .map(|table| check_table(table, "summary", validate_summary_record));
        (Some(cleaned_report), summary_report)
    };

    Ok(PipelineOutput {
        cleaned,
        summary,
        stats,
        csv_info,
        validation,
        summary_validation,
    })
}

fn check_table<F>(table: &CensusTable, name: &str, check: F) -> ValidationReport
where
    F: Fn(&serde_json::Value) -> Result<(), Vec<String>>,
{
    let (valid, invalid, errors) = validate_records(&table.to_records(), check, MAX_REPORTED_ERRORS);

    if invalid == 0 {
        log_success(format!("All {} {} rows valid", valid, name));
    } else {
        log_warning(format!("{} of {} {} rows failed validation", invalid, valid + invalid, name));
        for (i, errs) in errors.iter().take(3) {
            log_error(format!("Row {}: {}", i, errs.join(", ")));
        }
    }

    ValidationReport { valid, invalid, errors }
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CensusError;
    use crate::transform::condition::Field;
    use serde_json::json;
    use std::io::Write;

    const SAMPLE_CSV: &str = "\
Region,Variable Name,Age Name,Region Name,2008
KN.A2,\"Population, Total (Number)\",Total,Upper Nile,964353
KN.A2,\"Population, Male (Number)\",20 to 24,Upper Nile,1000
KN.A2,\"Population, Female (Number)\",20 to 24,Upper Nile,800
KN.A3,\"Population, Male (Number)\",0 to 4,Central Equatoria,500
KN.A3,\"Population, Male (Number)\",5 to 9,Central Equatoria,
";

    fn quiet() {
        crate::api::logs::set_echo(false);
    }

    fn by(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_default_options() {
        let opts = PipelineOptions::default();
        assert_eq!(opts.grouping, by(&["state", "gender", "category", "former_region"]));
        assert!(opts.summary_grouping.is_none());
        assert!(!opts.keep_totals);
        assert!(!opts.skip_validation);
        assert_eq!(opts.effective_condition(), Condition::exclude_totals());
    }

    #[test]
    fn test_options_from_json() {
        let opts = PipelineOptions::from_json(
            r#"{
                "grouping": ["state"],
                "summaryGrouping": ["state"],
                "keepTotals": true,
                "condition": { "op": "in", "column": "state", "values": ["Unity"] }
            }"#,
        )
        .unwrap();
        assert_eq!(opts.grouping, by(&["state"]));
        assert_eq!(opts.summary_grouping, Some(by(&["state"])));
        assert!(opts.keep_totals);
        assert!(!opts.skip_validation);
        assert!(matches!(opts.effective_condition(), Condition::In { column: Field::State, .. }));
    }

    #[test]
    fn test_process_csv_file() {
        quiet();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("census.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE_CSV.as_bytes()).unwrap();

        let options = PipelineOptions {
            grouping: by(&["former_region"]),
            summary_grouping: Some(by(&["former_region"])),
            ..PipelineOptions::default()
        };
        let output = process_csv(&path, &options).unwrap();

        assert_eq!(output.csv_info.delimiter, ',');
        assert_eq!(output.csv_info.row_count, 5);
        assert_eq!(
            output.cleaned.to_records(),
            vec![
                json!({ "former_region": "Greater Upper Nile", "total": 1800 }),
                json!({ "former_region": "Greater Equatoria", "total": 500 }),
            ]
        );
        assert_eq!(output.stats.rows_read, 5);
        assert_eq!(output.stats.rows_filtered, 1);
        assert_eq!(output.stats.rows_dropped, 1);

        let summary = output.summary.as_ref().unwrap();
        assert_eq!(summary.rows()[0].labels, Some(0.0));
        assert!(output.is_valid());
        assert_eq!(output.validation.as_ref().unwrap().valid, 2);
    }

    #[test]
    fn test_keep_totals() {
        quiet();
        let options = PipelineOptions {
            grouping: by(&["gender"]),
            keep_totals: true,
            skip_validation: true,
            ..PipelineOptions::default()
        };
        let output = process_bytes(SAMPLE_CSV.as_bytes(), &options).unwrap();

        assert_eq!(output.cleaned.rows()[0].values, vec!["Total"]);
        assert_eq!(output.cleaned.rows()[0].total, 964353);
        assert!(output.validation.is_none());
    }

    #[test]
    fn test_extra_condition_is_anded() {
        quiet();
        let options = PipelineOptions {
            grouping: by(&["state"]),
            condition: Some(Condition::equals(Field::State, "Central Equatoria")),
            ..PipelineOptions::default()
        };
        let output = process_bytes(SAMPLE_CSV.as_bytes(), &options).unwrap();
        assert_eq!(output.cleaned.to_records(), vec![json!({ "state": "Central Equatoria", "total": 500 })]);
    }

    #[test]
    fn test_run_pipeline_on_records() {
        quiet();
        let raw = RawTable::from_records(vec![json!({
            "Variable Name": "Population, Female (Number)",
            "Age Name": "65+",
            "Region Name": "Lakes",
            "2008": 2_500_000
        })]);
        let options = PipelineOptions {
            grouping: by(&["state", "category"]),
            summary_grouping: Some(by(&["state"])),
            ..PipelineOptions::default()
        };
        let output = run_pipeline(raw, &options).unwrap();

        assert_eq!(
            output.summary.unwrap().to_records(),
            vec![json!({ "state": "Lakes", "total": 2500000, "labels": 2.5 })]
        );
        assert_eq!(output.csv_info.encoding, "utf-8");
    }

    #[test]
    fn test_empty_input() {
        quiet();
        let raw = RawTable::new(by(&["Variable Name", "Age Name", "Region Name", "2008"]), vec![]);
        assert!(matches!(
            run_pipeline(raw, &PipelineOptions::default()),
            Err(PipelineError::EmptyInput)
        ));
    }

    #[test]
    fn test_census_errors_propagate() {
        quiet();
        let csv = "Region Name,2008\nUnity,10\n";
        let err = process_bytes(csv.as_bytes(), &PipelineOptions::default()).unwrap_err();
        match err {
            PipelineError::Census(CensusError::MissingColumns(cols)) => {
                assert_eq!(cols, by(&["Variable Name", "Age Name"]));
            }
            other => panic!("unexpected error: {other}"),
        }

        let options = PipelineOptions {
            summary_grouping: Some(by(&["population"])),
            ..PipelineOptions::default()
        };
        assert!(matches!(
            process_bytes(SAMPLE_CSV.as_bytes(), &options),
            Err(PipelineError::Census(CensusError::InvalidGrouping { .. }))
        ));
    }

    #[test]
    fn test_format_delimiter() {
        assert_eq!(format_delimiter('\t'), "TAB");
        assert_eq!(format_delimiter(';'), ";");
    }
}
