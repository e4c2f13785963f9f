//! JSON Schema validation for emitted census tables.
//!
//! Records produced by [`crate::CensusTable::to_records`] are checked with
//! JSON Schema Draft 7.
//!
//! # Embedded Schemas
//!
//! Schemas are embedded at compile time from the `schemas/` directory:
//! - `census-cleaned.json` - rows of [`crate::tweak_census`] output
//! - `census-summary.json` - rows of [`crate::summarize_census`] output (adds `labels`)
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use census::{validate_cleaned_record, is_valid_summary_record};
//!
//! let row = json!({ "state": "Unity", "gender": "Male", "total": 1000 });
//! assert!(validate_cleaned_record(&row).is_ok());
//!
//! let summary = json!({ "state": "A", "total": 2500000, "labels": 2.5 });
//! assert!(is_valid_summary_record(&summary));
//! ```

use jsonschema::Validator;
use once_cell::sync::Lazy;
use serde_json::Value;

static CLEANED_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/census-cleaned.json")).expect("Invalid embedded schema")
});

static SUMMARY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/census-summary.json")).expect("Invalid embedded schema")
});

static CLEANED_VALIDATOR: Lazy<Validator> =
    Lazy::new(|| jsonschema::draft7::new(&CLEANED_SCHEMA).expect("Invalid embedded schema"));

static SUMMARY_VALIDATOR: Lazy<Validator> =
    Lazy::new(|| jsonschema::draft7::new(&SUMMARY_SCHEMA).expect("Invalid embedded schema"));

/// Validate a JSON value against a JSON schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with every violation otherwise
///
/// # Example
/// ```ignore
/// use serde_json::json;
/// use census::validation::validate;
///
/// let schema = json!({
///     "type": "object",
///     "required": ["total"],
///     "properties": { "total": { "type": "integer" } }
/// });
///
/// assert!(validate(&schema, &json!({ "total": 3 })).is_ok());
/// assert!(validate(&schema, &json!({ "state": "A" })).is_err());
/// ```
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;
    collect_errors(&validator, data)
}

/// Boolean form of [`validate`].
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate one row of cleaner output.
pub fn validate_cleaned_record(data: &Value) -> Result<(), Vec<String>> {
    collect_errors(&CLEANED_VALIDATOR, data)
}

pub fn is_valid_cleaned_record(data: &Value) -> bool {
    CLEANED_VALIDATOR.is_valid(data)
}

/// Validate one row of summarizer output.
pub fn validate_summary_record(data: &Value) -> Result<(), Vec<String>> {
    collect_errors(&SUMMARY_VALIDATOR, data)
}

pub fn is_valid_summary_record(data: &Value) -> bool {
    SUMMARY_VALIDATOR.is_valid(data)
}

/// Validate every record, keeping at most `limit` error entries.
///
/// Returns `(valid, invalid, errors)` where each error entry is
/// `(record index, messages)`.
pub fn validate_records<F>(
    records: &[Value],
    check: F,
    limit: usize,
) -> (usize, usize, Vec<(usize, Vec<String>)>)
where
    F: Fn(&Value) -> Result<(), Vec<String>>,
{
    let mut valid = 0;
    let mut invalid = 0;
    let mut errors = Vec::new();

    for (i, record) in records.iter().enumerate() {
        match check(record) {
            Ok(()) => valid += 1,
            Err(errs) => {
                invalid += 1;
                if errors.len() < limit {
                    errors.push((i, errs));
                }
            }
        }
    }

    (valid, invalid, errors)
}

fn collect_errors(validator: &Validator, data: &Value) -> Result<(), Vec<String>> {
    let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_cleaned() {
        let row = json!({
            "state": "Unity",
            "gender": "Male",
            "category": "15-24",
            "former_region": "Greater Upper Nile",
            "total": 1000
        });
        assert!(is_valid_cleaned_record(&row));
        assert!(is_valid_cleaned_record(&json!({ "former_region": "Greater Equatoria", "total": 0 })));
    }

    #[test]
    fn test_invalid_cleaned() {
        // negative total
        assert!(!is_valid_cleaned_record(&json!({ "state": "Unity", "total": -1 })));
        // unknown region
        assert!(!is_valid_cleaned_record(&json!({ "former_region": "Kordofan", "total": 1 })));
        // no grouping column
        assert!(!is_valid_cleaned_record(&json!({ "total": 1 })));
        // unexpected column
        assert!(!is_valid_cleaned_record(&json!({ "state": "Unity", "total": 1, "population": 1 })));
    }

    #[test]
    fn test_summary_requires_labels() {
        let row = json!({ "state": "A", "total": 2500000, "labels": 2.5 });
        assert!(is_valid_summary_record(&row));

        let errors = validate_summary_record(&json!({ "state": "A", "total": 2500000 })).unwrap_err();
        assert!(!errors.is_empty());
        assert!(errors.iter().any(|e| e.contains("labels")));
    }

    #[test]
    fn test_cleaned_rejects_labels() {
        let row = json!({ "state": "A", "total": 2500000, "labels": 2.5 });
        assert!(validate_cleaned_record(&row).is_err());
    }

    #[test]
    fn test_validate_records_counts() {
        let records = vec![
            json!({ "state": "A", "total": 1 }),
            json!({ "state": "B" }),
            json!({ "state": "C", "total": "x" }),
        ];
        let (valid, invalid, errors) = validate_records(&records, validate_cleaned_record, 1);
        assert_eq!(valid, 1);
        assert_eq!(invalid, 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, 1);
    }

    #[test]
    fn test_generic_validate() {
        let schema = json!({ "type": "object", "required": ["name"] });
        assert!(validate(&schema, &json!({ "name": "x" })).is_ok());
        assert!(!is_valid(&schema, &json!({})));
    }
}
