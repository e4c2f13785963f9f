//! In-memory tables flowing through the pipeline.
//!
//! - [`RawTable`] - Parsed census export (headers + JSON rows), cleaner input
//! - [`CensusTable`] - Grouped totals, cleaner output and summarizer input/output
//!
//! # Layout
//!
//! ```text
//! columns: [former_region, gender]      rows:
//! ┌────────────────────────┬────────┬─────────┬────────┐
//! │ former_region          │ gender │ total   │ labels │
//! ├────────────────────────┼────────┼─────────┼────────┤
//! │ Greater Equatoria      │ Male   │ 1230000 │ 1.23   │  (labels only
//! │ Greater Upper Nile     │ Female │  980000 │ 0.98   │   on summaries)
//! └────────────────────────┴────────┴─────────┴────────┘
//! ```

use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use crate::error::{CensusError, CensusResult};
use crate::parser::ParseResult;

/// Name of the aggregated column.
pub const TOTAL_COLUMN: &str = "total";
/// Name of the millions label column added by the summarizer.
pub const LABELS_COLUMN: &str = "labels";

// =============================================================================
// Raw input
// =============================================================================

/// Raw census rows with their header list.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<Value>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, records: Vec<Value>) -> Self {
        Self { headers, records }
    }

    /// Build from JSON objects, taking headers from the keys in first-seen order.
    pub fn from_records(records: Vec<Value>) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for record in &records {
            if let Some(obj) = record.as_object() {
                for key in obj.keys() {
                    if !headers.contains(key) {
                        headers.push(key.clone());
                    }
                }
            }
        }
        Self { headers, records }
    }

    /// Required columns absent from the headers, in the order given.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|col| !self.headers.iter().any(|h| h == *col))
            .map(|col| col.to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<ParseResult> for RawTable {
    fn from(parsed: ParseResult) -> Self {
        Self::new(parsed.headers, parsed.records)
    }
}

// =============================================================================
// Census table
// =============================================================================

/// One group: key values in column order, its total and, on summaries, its label.
#[derive(Debug, Clone, PartialEq)]
pub struct CensusRow {
    pub values: Vec<String>,
    pub total: u64,
    pub labels: Option<f64>,
}

impl CensusRow {
    pub fn new(values: Vec<String>, total: u64) -> Self {
        Self { values, total, labels: None }
    }
}

/// Grouped population totals, sorted descending by `total`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CensusTable {
    columns: Vec<String>,
    rows: Vec<CensusRow>,
}

impl CensusTable {
    /// Build a table from rows already in the desired order.
    pub fn new(columns: Vec<String>, rows: Vec<CensusRow>) -> Self {
        Self { columns, rows }
    }

    /// Sum totals per distinct key and sort descending.
    ///
    /// Groups are created in first-seen order and the sort is stable, so
    /// equal totals keep that order.
    pub fn aggregate<I>(columns: Vec<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (Vec<String>, u64)>,
    {
        let mut index: HashMap<Vec<String>, usize> = HashMap::new();
        let mut rows: Vec<CensusRow> = Vec::new();

        for (key, amount) in entries {
            match index.get(&key) {
                Some(&i) => rows[i].total = rows[i].total.saturating_add(amount),
                None => {
                    index.insert(key.clone(), rows.len());
                    rows.push(CensusRow::new(key, amount));
                }
            }
        }

        rows.sort_by(|a, b| b.total.cmp(&a.total));
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[CensusRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of all totals.
    pub fn grand_total(&self) -> u64 {
        self.rows.iter().fold(0u64, |acc, r| acc.saturating_add(r.total))
    }

    pub fn has_labels(&self) -> bool {
        self.rows.iter().any(|r| r.labels.is_some())
    }

    /// Positions of the named key columns.
    pub fn resolve<S: AsRef<str>>(&self, cols: &[S]) -> CensusResult<Vec<usize>> {
        if cols.is_empty() {
            return Err(CensusError::EmptyGrouping);
        }
        let mut indices: Vec<usize> = Vec::with_capacity(cols.len());
        for col in cols {
            let col = col.as_ref();
            let index = self
                .columns
                .iter()
                .position(|c| c == col)
                .ok_or_else(|| CensusError::InvalidGrouping {
                    column: col.to_string(),
                    available: self.columns.clone(),
                })?;
            if indices.contains(&index) {
                return Err(CensusError::DuplicateGrouping(col.to_string()));
            }
            indices.push(index);
        }
        Ok(indices)
    }

    /// Row whose key values equal `key` (in column order).
    pub fn find(&self, key: &[&str]) -> Option<&CensusRow> {
        self.rows
            .iter()
            .find(|r| r.values.len() == key.len() && r.values.iter().zip(key).all(|(a, b)| a == b))
    }

    /// Attach `labels = round(total / 1e6, 2)` to every row.
    pub fn with_labels(mut self) -> Self {
        for row in &mut self.rows {
            row.labels = Some(millions_label(row.total));
        }
        self
    }

    /// Rows as JSON objects: key columns, then `total`, then `labels` when set.
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut obj = Map::new();
                for (col, value) in self.columns.iter().zip(&row.values) {
                    obj.insert(col.clone(), Value::String(value.clone()));
                }
                obj.insert(TOTAL_COLUMN.to_string(), Value::from(row.total));
                if let Some(labels) = row.labels {
                    obj.insert(LABELS_COLUMN.to_string(), Value::from(labels));
                }
                Value::Object(obj)
            })
            .collect()
    }

    /// Load a table from JSON objects (e.g. a saved cleaner output or parsed CSV).
    ///
    /// Every key other than `total` and `labels` becomes a key column; a null
    /// or missing key value is read as an empty string. `total` must be a
    /// non-negative integer, given as a number or a numeric string.
    pub fn from_records(records: &[Value]) -> CensusResult<Self> {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            if let Some(obj) = record.as_object() {
                for key in obj.keys() {
                    if key != TOTAL_COLUMN && key != LABELS_COLUMN && !columns.contains(key) {
                        columns.push(key.clone());
                    }
                }
            }
        }

        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let row_num = i + 1;
            let obj = record.as_object().ok_or_else(|| CensusError::InvalidValue {
                row: row_num,
                column: "<row>".to_string(),
                value: record.to_string(),
            })?;

            let total_value = obj.get(TOTAL_COLUMN).ok_or(CensusError::MissingTotal)?;
            let total = parse_count(total_value).ok_or_else(|| CensusError::InvalidValue {
                row: row_num,
                column: TOTAL_COLUMN.to_string(),
                value: display_value(total_value),
            })?;

            let values = columns
                .iter()
                .map(|col| obj.get(col).map(display_value).unwrap_or_default())
                .collect();

            let labels = obj.get(LABELS_COLUMN).and_then(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            });

            rows.push(CensusRow { values, total, labels });
        }

        Ok(Self { columns, rows })
    }

    /// Write the table as CSV with a header line.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        let with_labels = self.has_labels();

        let mut header: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        header.push(TOTAL_COLUMN);
        if with_labels {
            header.push(LABELS_COLUMN);
        }
        wtr.write_record(&header)?;

        for row in &self.rows {
            let mut record = row.values.clone();
            record.push(row.total.to_string());
            if with_labels {
                record.push(row.labels.map(|l| l.to_string()).unwrap_or_default());
            }
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }
}

/// Total in millions, rounded to two decimals.
pub fn millions_label(total: u64) -> f64 {
    (total as f64 / 1_000_000.0 * 100.0).round() / 100.0
}

/// Non-negative integer from a JSON number or numeric string.
pub(crate) fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(integral_f64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
        }
        _ => None,
    }
}

fn integral_f64(n: f64) -> Option<u64> {
    (n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= u64::MAX as f64).then_some(n as u64)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Serialize for CensusTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.to_records())
    }
}

impl fmt::Display for CensusTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let with_labels = self.has_labels();

        let mut header: Vec<String> = self.columns.clone();
        header.push(TOTAL_COLUMN.to_string());
        if with_labels {
            header.push(LABELS_COLUMN.to_string());
        }

        let body: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                let mut cells = row.values.clone();
                cells.push(row.total.to_string());
                if with_labels {
                    cells.push(row.labels.map(|l| format!("{:.2}", l)).unwrap_or_default());
                }
                cells
            })
            .collect();

        let widths: Vec<usize> = (0..header.len())
            .map(|i| {
                body.iter()
                    .map(|cells| cells[i].chars().count())
                    .chain(std::iter::once(header[i].chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let key_count = self.columns.len();
        let line = |cells: &[String]| {
            cells
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    if i < key_count {
                        format!("{:<width$}", c, width = widths[i])
                    } else {
                        format!("{:>width$}", c, width = widths[i])
                    }
                })
                .collect::<Vec<_>>()
                .join("  ")
        };

        writeln!(f, "{}", line(&header).trim_end())?;
        writeln!(f, "{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "))?;
        for cells in &body {
            writeln!(f, "{}", line(cells).trim_end())?;
        }
        Ok(())
    }
}
