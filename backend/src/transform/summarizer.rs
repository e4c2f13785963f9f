//! Re-aggregate grouped totals and attach a millions label.

use super::table::CensusTable;
use crate::api::logs::log_success;
use crate::error::CensusResult;

/// Summarize a census table by `cols`.
///
/// Groups the input by `cols`, sums `total`, sorts the groups descending by
/// their summed total and adds `labels` (total in millions, two decimals).
/// Works on any [`CensusTable`] with the requested key columns, including a
/// previous summary.
///
/// # Example
/// ```ignore
/// let by_state = tweak_census(&raw, &["state", "gender"], &Condition::exclude_totals())?;
/// let summary = summarize_census(&by_state, &["state"])?;
/// for row in summary.rows() {
///     println!("{}: {:.2}M", row.values[0], row.labels.unwrap_or_default());
/// }
/// ```
pub fn summarize_census<S: AsRef<str>>(table: &CensusTable, cols: &[S]) -> CensusResult<CensusTable> {
    let indices = table.resolve(cols)?;
    let columns = cols.iter().map(|c| c.as_ref().to_string()).collect();

    let summary = CensusTable::aggregate(
        columns,
        table.rows().iter().map(|row| {
            let key = indices.iter().map(|&i| row.values[i].clone()).collect();
            (key, row.total)
        }),
    )
    .with_labels();

    log_success(format!(
        "Summarized {} row(s) into {} group(s)",
        table.len(),
        summary.len()
    ));

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CensusError;
    use crate::transform::table::CensusRow;
    use serde_json::json;

    fn table(columns: &[&str], rows: Vec<(Vec<&str>, u64)>) -> CensusTable {
        CensusTable::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.into_iter()
                .map(|(values, total)| CensusRow::new(values.iter().map(|v| v.to_string()).collect(), total))
                .collect(),
        )
    }

    #[test]
    fn test_single_state_label() {
        let input = CensusTable::from_records(&[json!({ "state": "A", "total": 2_500_000 })]).unwrap();
        let summary = summarize_census(&input, &["state"]).unwrap();

        assert_eq!(summary.to_records(), vec![json!({ "state": "A", "total": 2500000, "labels": 2.5 })]);
    }

    #[test]
    fn test_regroups_and_sorts() {
        let input = table(
            &["former_region", "gender"],
            vec![
                (vec!["Greater Equatoria", "Male"], 1_100_000),
                (vec!["Greater Upper Nile", "Male"], 1_000_000),
                (vec!["Greater Equatoria", "Female"], 1_050_000),
                (vec!["Greater Upper Nile", "Female"], 950_000),
                (vec!["Greater Bahr el Ghazal", "Female"], 2_600_000),
            ],
        );

        let by_gender = summarize_census(&input, &["gender"]).unwrap();
        assert_eq!(by_gender.columns(), &["gender".to_string()][..]);
        assert_eq!(by_gender.rows()[0].values, vec!["Female"]);
        assert_eq!(by_gender.rows()[0].total, 4_600_000);
        assert_eq!(by_gender.rows()[0].labels, Some(4.6));
        assert_eq!(by_gender.rows()[1].total, 2_100_000);
        assert_eq!(by_gender.rows()[1].labels, Some(2.1));
    }

    #[test]
    fn test_labels_match_rounded_millions() {
        let input = table(
            &["state"],
            vec![(vec!["A"], 1_234_567), (vec!["B"], 987_654), (vec!["C"], 4_999), (vec!["D"], 0)],
        );
        let summary = summarize_census(&input, &["state"]).unwrap();
        for row in summary.rows() {
            let expected = (row.total as f64 / 1_000_000.0 * 100.0).round() / 100.0;
            assert_eq!(row.labels, Some(expected));
        }
        assert_eq!(summary.find(&["A"]).unwrap().labels, Some(1.23));
        assert_eq!(summary.find(&["B"]).unwrap().labels, Some(0.99));
    }

    #[test]
    fn test_idempotent_on_own_output() {
        let input = table(
            &["state", "gender"],
            vec![(vec!["Unity", "Male"], 300), (vec!["Unity", "Female"], 200), (vec!["Lakes", "Male"], 700)],
        );
        let once = summarize_census(&input, &["state"]).unwrap();
        let twice = summarize_census(&once, &["state"]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_column_order_follows_request() {
        let input = table(&["state", "gender"], vec![(vec!["Unity", "Male"], 1)]);
        let summary = summarize_census(&input, &["gender", "state"]).unwrap();
        assert_eq!(summary.rows()[0].values, vec!["Male", "Unity"]);
    }

    #[test]
    fn test_unknown_column() {
        let input = table(&["state"], vec![(vec!["Unity"], 1)]);
        assert!(matches!(
            summarize_census(&input, &["former_region"]),
            Err(CensusError::InvalidGrouping { .. })
        ));
        assert!(matches!(
            summarize_census(&input, &["total"]),
            Err(CensusError::InvalidGrouping { .. })
        ));
        assert_eq!(
            summarize_census::<&str>(&input, &[]).unwrap_err(),
            CensusError::EmptyGrouping
        );
    }

    #[test]
    fn test_repeated_column() {
        let input = table(&["state", "gender"], vec![(vec!["Unity", "Male"], 1)]);
        assert_eq!(
            summarize_census(&input, &["state", "state"]).unwrap_err(),
            CensusError::DuplicateGrouping("state".into())
        );
    }

    #[test]
    fn test_empty_table() {
        let input = table(&["state"], vec![]);
        let summary = summarize_census(&input, &["state"]).unwrap();
        assert!(summary.is_empty());
    }
}
