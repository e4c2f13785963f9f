//! Raw census rows → grouped population totals.
//!
//! ```text
//! Variable Name | Age Name | Region Name | 2008        state | gender | category | former_region | total
//! ──────────────┼──────────┼─────────────┼─────   →    ──────┼────────┼──────────┼───────────────┼──────
//! Population,   | 20 to 24 | Unity       | 1000        (grouped by the caller's columns, summed,
//!   Male (...)  |          |             |              sorted by total descending)
//! ```
//!
//! Steps, in order: project the four source columns, decode `gender`, bucket
//! `category`, apply the caller's condition, drop rows with nulls, rename to
//! `state`/`population`, derive `former_region`, group and sum, sort.

use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;

use super::condition::{RowPredicate, RowView};
use super::table::{parse_count, CensusTable, RawTable};
use crate::api::logs::{log_info, log_success, log_warning};
use crate::error::{CensusError, CensusResult};
use crate::models::{
    age_category, CensusRecord, Dimension, FormerRegion, Gender, AGE_NAME, REGION_NAME,
    REQUIRED_COLUMNS, VALUE_COLUMN, VARIABLE_NAME,
};

/// Row counts from one cleaning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanStats {
    /// Rows read from the input.
    pub rows_read: usize,
    /// Rows rejected by the condition.
    pub rows_filtered: usize,
    /// Rows dropped for holding a null.
    pub rows_dropped: usize,
}

impl CleanStats {
    pub fn rows_kept(&self) -> usize {
        self.rows_read - self.rows_filtered - self.rows_dropped
    }
}

/// Clean and aggregate raw census rows.
///
/// # Arguments
/// * `raw` - Parsed census export; must have `Variable Name`, `Age Name`, `Region Name` and `2008`
/// * `grouping_cols` - Non-empty list drawn from `state`, `gender`, `category`, `former_region`
/// * `condition` - Row filter, applied before null-dropping
///
/// # Returns
/// One row per distinct combination of `grouping_cols` with its summed
/// population in `total`, sorted descending by `total`.
///
/// # Example
/// ```ignore
/// use census::{tweak_census, Condition, RawTable};
///
/// let table = tweak_census(&raw, &["state", "gender"], &Condition::exclude_totals())?;
/// println!("{}", table);
/// ```
pub fn tweak_census<S, P>(raw: &RawTable, grouping_cols: &[S], condition: &P) -> CensusResult<CensusTable>
where
    S: AsRef<str>,
    P: RowPredicate + ?Sized,
{
    tweak_census_with_stats(raw, grouping_cols, condition).map(|(table, _)| table)
}

/// Same as [`tweak_census`], also returning row counts.
pub fn tweak_census_with_stats<S, P>(
    raw: &RawTable,
    grouping_cols: &[S],
    condition: &P,
) -> CensusResult<(CensusTable, CleanStats)>
where
    S: AsRef<str>,
    P: RowPredicate + ?Sized,
{
    let dimensions = resolve_dimensions(grouping_cols)?;
    let (records, stats) = clean_records_with_stats(raw, condition)?;

    let columns = dimensions.iter().map(|d| d.name().to_string()).collect();
    let table = CensusTable::aggregate(
        columns,
        records.iter().map(|record| {
            let key = dimensions.iter().map(|d| record.dimension(*d).to_string()).collect();
            (key, record.population)
        }),
    );

    log_success(format!(
        "{} group(s) by [{}], population {}",
        table.len(),
        grouping_cols.iter().map(|c| c.as_ref()).collect::<Vec<_>>().join(", "),
        table.grand_total()
    ));

    Ok((table, stats))
}

/// Steps 1–8: decoded, filtered, null-free rows ready for grouping.
pub fn clean_records<P>(raw: &RawTable, condition: &P) -> CensusResult<Vec<CensusRecord>>
where
    P: RowPredicate + ?Sized,
{
    clean_records_with_stats(raw, condition).map(|(records, _)| records)
}

fn clean_records_with_stats<P>(raw: &RawTable, condition: &P) -> CensusResult<(Vec<CensusRecord>, CleanStats)>
where
    P: RowPredicate + ?Sized,
{
    let missing = raw.missing_columns(&REQUIRED_COLUMNS);
    if !missing.is_empty() {
        return Err(CensusError::MissingColumns(missing));
    }

    let mut stats = CleanStats {
        rows_read: raw.len(),
        ..CleanStats::default()
    };
    let mut records = Vec::with_capacity(raw.len());

    for (i, record) in raw.records.iter().enumerate() {
        let row_num = i + 1;

        let gender = match text_cell(record, VARIABLE_NAME, row_num)? {
            Some(v) => Some(Gender::from_variable_name(&v).ok_or_else(|| CensusError::UnknownVariable {
                row: row_num,
                value: v.into_owned(),
            })?),
            None => None,
        };
        let age = text_cell(record, AGE_NAME, row_num)?;
        let region = text_cell(record, REGION_NAME, row_num)?;
        let category = age.as_deref().map(age_category);
        let state = region.as_deref();
        let population = count_cell(record, VALUE_COLUMN, row_num)?;

        let view = RowView {
            state,
            gender,
            category,
            population,
        };

        if !condition.test(&view) {
            stats.rows_filtered += 1;
            continue;
        }

        let (Some(state), Some(gender), Some(category), Some(population)) = (state, gender, category, population)
        else {
            stats.rows_dropped += 1;
            continue;
        };

        records.push(CensusRecord {
            state: state.to_string(),
            gender,
            category: category.to_string(),
            former_region: FormerRegion::for_state(state),
            population,
        });
    }

    log_info(format!(
        "Read {} rows: {} filtered out, {} dropped with missing values, {} kept",
        stats.rows_read,
        stats.rows_filtered,
        stats.rows_dropped,
        stats.rows_kept()
    ));
    if stats.rows_read > 0 && records.is_empty() {
        log_warning("No rows left after filtering");
    }

    Ok((records, stats))
}

fn resolve_dimensions<S: AsRef<str>>(grouping_cols: &[S]) -> CensusResult<Vec<Dimension>> {
    if grouping_cols.is_empty() {
        return Err(CensusError::EmptyGrouping);
    }
    let mut dimensions: Vec<Dimension> = Vec::with_capacity(grouping_cols.len());
    for col in grouping_cols {
        let col = col.as_ref();
        let dimension = col.parse::<Dimension>().map_err(|_| CensusError::InvalidGrouping {
            column: col.to_string(),
            available: Dimension::names(),
        })?;
        if dimensions.contains(&dimension) {
            return Err(CensusError::DuplicateGrouping(dimension.name().to_string()));
        }
        dimensions.push(dimension);
    }
    Ok(dimensions)
}

/// Text cell. Nulls and blank strings are missing, numbers and booleans
/// are read as their text, anything else is an error.
fn text_cell<'a>(record: &'a Value, column: &str, row: usize) -> CensusResult<Option<Cow<'a, str>>> {
    match record.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then_some(Cow::Borrowed(s)))
        }
        Some(Value::Number(n)) => Ok(Some(Cow::Owned(n.to_string()))),
        Some(Value::Bool(b)) => Ok(Some(Cow::Owned(b.to_string()))),
        Some(other) => Err(CensusError::InvalidValue {
            row,
            column: column.to_string(),
            value: other.to_string(),
        }),
    }
}

/// Population cell; missing is `None`, anything but a non-negative integer is an error.
fn count_cell(record: &Value, column: &str, row: usize) -> CensusResult<Option<u64>> {
    match record.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(value) => parse_count(value).map(Some).ok_or_else(|| CensusError::InvalidValue {
            row,
            column: column.to_string(),
            value: match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::condition::Condition;
    use serde_json::json;

    fn raw_row(variable: &str, age: &str, region: &str, value: &str) -> Value {
        json!({
            "Region": "KN.A2",
            "Region Name": region,
            "Variable Name": variable,
            "Age Name": age,
            "Scale": "units",
            "2008": value,
        })
    }

    fn raw(rows: Vec<Value>) -> RawTable {
        RawTable::from_records(rows)
    }

    fn accept_all(_: &RowView<'_>) -> bool {
        true
    }

    fn sample() -> RawTable {
        raw(vec![
            raw_row("Population, Male (Number)", "20 to 24", "Unity", "1000"),
            raw_row("Population, Female (Number)", "15 to 19", "Unity", "1500"),
            raw_row("Population, Male (Number)", "65+", "Central Equatoria", "400"),
            raw_row("Population, Female (Number)", "0 to 4", "Lakes", "3000"),
            raw_row("Population, Total (Number)", "Total", "Lakes", "9999"),
            raw_row("Population, Male (Number)", "30 to 34", "Northern Bahr el Ghazal", "700"),
        ])
    }

    #[test]
    fn test_single_row_by_former_region() {
        let raw = raw(vec![raw_row("Population, Male (Number)", "20 to 24", "Unity", "1000")]);
        let table = tweak_census(&raw, &["former_region"], &accept_all).unwrap();

        assert_eq!(table.columns(), &["former_region".to_string()][..]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].values, vec!["Greater Upper Nile"]);
        assert_eq!(table.rows()[0].total, 1000);
        assert_eq!(table.to_records()[0], json!({ "former_region": "Greater Upper Nile", "total": 1000 }));
    }

    #[test]
    fn test_grouping_and_sorting() {
        let table = tweak_census(&sample(), &["former_region"], &Condition::exclude_totals()).unwrap();

        // Lakes (3000) and Northern Bahr el Ghazal (700) both land in Bahr el Ghazal.
        assert_eq!(table.find(&["Greater Bahr el Ghazal"]).unwrap().total, 3700);
        assert_eq!(table.find(&["Greater Upper Nile"]).unwrap().total, 2500);
        assert_eq!(table.find(&["Greater Equatoria"]).unwrap().total, 400);

        let totals: Vec<u64> = table.rows().iter().map(|r| r.total).collect();
        assert!(totals.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_multi_column_grouping_keeps_caller_order() {
        let table = tweak_census(&sample(), &["gender", "category"], &Condition::exclude_totals()).unwrap();
        assert_eq!(table.columns(), &["gender".to_string(), "category".to_string()][..]);
        assert_eq!(table.find(&["Female", "0-14"]).unwrap().total, 3000);
        assert_eq!(table.find(&["Male", "65 and above"]).unwrap().total, 400);
        assert_eq!(table.find(&["Male", "25-34"]).unwrap().total, 700);
    }

    #[test]
    fn test_unmapped_age_passes_through() {
        let table = tweak_census(&sample(), &["category"], &accept_all).unwrap();
        assert_eq!(table.find(&["Total"]).unwrap().total, 9999);
    }

    #[test]
    fn test_condition_with_closure() {
        let only_unity = |row: &RowView<'_>| row.state == Some("Unity");
        let table = tweak_census(&sample(), &["state", "gender"], &only_unity).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].values, vec!["Unity", "Female"]);
        assert_eq!(table.rows()[1].values, vec!["Unity", "Male"]);
    }

    #[test]
    fn test_condition_sees_source_values_before_drop() {
        // The condition runs before null-dropping and can inspect missing fields.
        let raw = raw(vec![
            raw_row("Population, Male (Number)", "20 to 24", "", "10"),
            raw_row("Population, Male (Number)", "20 to 24", "Unity", "20"),
        ]);
        let (_, stats) = tweak_census_with_stats(
            &raw,
            &["state"],
            &Condition::IsNull { column: crate::transform::condition::Field::State },
        )
        .unwrap();
        assert_eq!(stats.rows_filtered, 1);
        assert_eq!(stats.rows_dropped, 1);
        assert_eq!(stats.rows_kept(), 0);
    }

    #[test]
    fn test_null_rows_dropped() {
        let raw = raw(vec![
            raw_row("Population, Male (Number)", "20 to 24", "", "1000"),
            raw_row("Population, Male (Number)", "20 to 24", "Unity", ""),
            json!({ "Variable Name": null, "Age Name": "65+", "Region Name": "Lakes", "2008": "5" }),
            json!({ "Variable Name": "Population, Female (Number)", "Age Name": "65+", "Region Name": "Lakes", "2008": 7 }),
        ]);

        let (table, stats) = tweak_census_with_stats(&raw, &["state"], &accept_all).unwrap();
        assert_eq!(stats.rows_read, 4);
        assert_eq!(stats.rows_dropped, 3);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].values, vec!["Lakes"]);
        assert_eq!(table.rows()[0].total, 7);
    }

    #[test]
    fn test_clean_records_derives_fields() {
        let records = clean_records(&sample(), &Condition::exclude_totals()).unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(
            records[2],
            CensusRecord {
                state: "Central Equatoria".into(),
                gender: Gender::Male,
                category: "65 and above".into(),
                former_region: FormerRegion::GreaterEquatoria,
                population: 400,
            }
        );
    }

    #[test]
    fn test_missing_source_columns() {
        let raw = raw(vec![json!({ "Region Name": "Unity", "2008": "10" })]);
        let err = tweak_census(&raw, &["state"], &accept_all).unwrap_err();
        assert_eq!(
            err,
            CensusError::MissingColumns(vec!["Variable Name".into(), "Age Name".into()])
        );
    }

    #[test]
    fn test_schema_checked_even_without_rows() {
        let raw = RawTable::new(vec!["Region Name".into()], vec![]);
        assert!(matches!(
            tweak_census(&raw, &["state"], &accept_all),
            Err(CensusError::MissingColumns(_))
        ));
    }

    #[test]
    fn test_unknown_grouping_column() {
        let err = tweak_census(&sample(), &["state", "population"], &accept_all).unwrap_err();
        match err {
            CensusError::InvalidGrouping { column, available } => {
                assert_eq!(column, "population");
                assert_eq!(available, vec!["state", "gender", "category", "former_region"]);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(
            tweak_census::<&str, _>(&sample(), &[], &accept_all).unwrap_err(),
            CensusError::EmptyGrouping
        );
    }

    #[test]
    fn test_unknown_variable_fails_loudly() {
        let raw = raw(vec![
            raw_row("Population, Male (Number)", "20 to 24", "Unity", "1"),
            raw_row("Households (Number)", "20 to 24", "Unity", "1"),
        ]);
        let err = tweak_census(&raw, &["gender"], &accept_all).unwrap_err();
        assert_eq!(
            err,
            CensusError::UnknownVariable { row: 2, value: "Households (Number)".into() }
        );
    }

    #[test]
    fn test_non_text_cells_are_not_nulls() {
        let numeric_variable = raw(vec![
            raw_row("Population, Male (Number)", "20 to 24", "Unity", "1"),
            json!({ "Variable Name": 42, "Age Name": "20 to 24", "Region Name": "Unity", "2008": 5 }),
        ]);
        assert_eq!(
            tweak_census(&numeric_variable, &["state"], &accept_all).unwrap_err(),
            CensusError::UnknownVariable { row: 2, value: "42".into() }
        );

        let numeric_age = raw(vec![
            json!({ "Variable Name": "Population, Male (Number)", "Age Name": 7, "Region Name": "Unity", "2008": 6 }),
            raw_row("Population, Male (Number)", "20 to 24", "Unity", "1"),
        ]);
        let (table, stats) = tweak_census_with_stats(&numeric_age, &["category"], &accept_all).unwrap();
        assert_eq!(stats.rows_dropped, 0);
        assert_eq!(table.find(&["7"]).unwrap().total, 6);

        let nested_region = raw(vec![json!({
            "Variable Name": "Population, Male (Number)",
            "Age Name": "20 to 24",
            "Region Name": ["Unity"],
            "2008": 6,
        })]);
        assert!(matches!(
            tweak_census(&nested_region, &["state"], &accept_all),
            Err(CensusError::InvalidValue { row: 1, .. })
        ));
    }

    #[test]
    fn test_repeated_grouping_column() {
        assert_eq!(
            tweak_census(&sample(), &["state", "gender", "state"], &accept_all).unwrap_err(),
            CensusError::DuplicateGrouping("state".into())
        );
    }

    #[test]
    fn test_invalid_population() {
        let raw = raw(vec![raw_row("Population, Male (Number)", "20 to 24", "Unity", "-5")]);
        assert!(matches!(
            tweak_census(&raw, &["state"], &accept_all),
            Err(CensusError::InvalidValue { row: 1, .. })
        ));
    }

    #[test]
    fn test_dyn_condition() {
        let condition: Box<dyn RowPredicate> = Box::new(Condition::exclude_totals());
        let table = tweak_census(&sample(), &["state"], condition.as_ref()).unwrap();
        assert!(table.find(&["Lakes"]).is_some_and(|r| r.total == 3000));
    }
}
