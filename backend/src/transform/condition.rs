//! Row conditions for the cleaner's filter step.
//!
//! The filter runs after `gender` and `category` are derived but before rows
//! with nulls are dropped, so every field of a [`RowView`] is optional.
//!
//! A condition is anything implementing [`RowPredicate`]: a closure, or the
//! declarative [`Condition`] which can be loaded from JSON or parsed from
//! short clauses such as `gender != Total`.
//!
//! ```json
//! { "op": "and", "conditions": [
//!     { "op": "ne", "column": "gender", "value": "Total" },
//!     { "op": "in", "column": "state", "values": ["Unity", "Jonglei"] }
//! ] }
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::ConditionError;
use crate::models::{Gender, REGION_NAME, VALUE_COLUMN};

/// A row as seen by the filter step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RowView<'a> {
    pub state: Option<&'a str>,
    pub gender: Option<Gender>,
    pub category: Option<&'a str>,
    pub population: Option<u64>,
}

impl<'a> RowView<'a> {
    fn cell(&self, field: Field) -> Option<Cell<'a>> {
        match field {
            Field::State => self.state.map(Cell::Text),
            Field::Gender => self.gender.map(|g| Cell::Text(g.as_str())),
            Field::Category => self.category.map(Cell::Text),
            Field::Population => self.population.map(Cell::Number),
        }
    }
}

/// Decides whether a row survives the filter step.
pub trait RowPredicate {
    fn test(&self, row: &RowView<'_>) -> bool;
}

impl<F> RowPredicate for F
where
    F: Fn(&RowView<'_>) -> bool,
{
    fn test(&self, row: &RowView<'_>) -> bool {
        self(row)
    }
}

impl RowPredicate for Condition {
    /// A null result rejects the row, like a false one.
    fn test(&self, row: &RowView<'_>) -> bool {
        self.evaluate(row) == Some(true)
    }
}

// =============================================================================
// Fields and literals
// =============================================================================

/// Columns available to a condition.
///
/// The source names `Region Name` and `2008` are accepted as aliases since
/// the filter runs before the rename step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Field {
    State,
    Gender,
    Category,
    Population,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::State => "state",
            Field::Gender => "gender",
            Field::Category => "category",
            Field::Population => "population",
        }
    }
}

impl FromStr for Field {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "state" | REGION_NAME => Ok(Field::State),
            "gender" => Ok(Field::Gender),
            "category" => Ok(Field::Category),
            "population" | VALUE_COLUMN => Ok(Field::Population),
            other => Err(ConditionError::UnknownColumn(other.to_string())),
        }
    }
}

impl TryFrom<String> for Field {
    type Error = ConditionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Field> for String {
    fn from(field: Field) -> Self {
        field.name().to_string()
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Number(f64),
    Text(String),
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Text(s.to_string())
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Number(n)
    }
}

impl From<u64> for Literal {
    fn from(n: u64) -> Self {
        Literal::Number(n as f64)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Cell<'a> {
    Text(&'a str),
    Number(u64),
}

/// `None` when the two sides cannot be ordered (e.g. population vs "abc").
fn compare(cell: Cell<'_>, literal: &Literal) -> Option<Ordering> {
    match (cell, literal) {
        (Cell::Text(s), Literal::Text(t)) => Some(s.cmp(t.as_str())),
        (Cell::Text(s), Literal::Number(n)) => Some(s.cmp(n.to_string().as_str())),
        (Cell::Number(p), Literal::Number(n)) => (p as f64).partial_cmp(n),
        (Cell::Number(p), Literal::Text(t)) => {
            let n: f64 = t.trim().parse().ok()?;
            (p as f64).partial_cmp(&n)
        }
    }
}

// =============================================================================
// Condition
// =============================================================================

/// Declarative row condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    /// Accept every row.
    All,
    Eq { column: Field, value: Literal },
    Ne { column: Field, value: Literal },
    Gt { column: Field, value: Literal },
    Ge { column: Field, value: Literal },
    Lt { column: Field, value: Literal },
    Le { column: Field, value: Literal },
    In { column: Field, values: Vec<Literal> },
    NotIn { column: Field, values: Vec<Literal> },
    IsNull { column: Field },
    IsNotNull { column: Field },
    And { conditions: Vec<Condition> },
    Or { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
}

impl Default for Condition {
    fn default() -> Self {
        Condition::All
    }
}

impl Condition {
    pub fn equals(column: Field, value: impl Into<Literal>) -> Self {
        Condition::Eq { column, value: value.into() }
    }

    pub fn not_equals(column: Field, value: impl Into<Literal>) -> Self {
        Condition::Ne { column, value: value.into() }
    }

    /// `And` of the given conditions, collapsing the trivial cases.
    pub fn all_of(mut conditions: Vec<Condition>) -> Self {
        match conditions.len() {
            0 => Condition::All,
            1 => conditions.remove(0),
            _ => Condition::And { conditions },
        }
    }

    /// Drop the dataset's pre-aggregated rows (`gender` or `category` equal to `Total`).
    pub fn exclude_totals() -> Self {
        Condition::all_of(vec![
            Condition::not_equals(Field::Gender, "Total"),
            Condition::not_equals(Field::Category, "Total"),
        ])
    }

    /// Evaluate with three-valued logic; `None` means null.
    pub fn evaluate(&self, row: &RowView<'_>) -> Option<bool> {
        match self {
            Condition::All => Some(true),
            Condition::Eq { column, value } => Self::cmp(row, *column, value).map(|o| o == Ordering::Equal),
            Condition::Ne { column, value } => Self::cmp(row, *column, value).map(|o| o != Ordering::Equal),
            Condition::Gt { column, value } => Self::cmp(row, *column, value).map(|o| o == Ordering::Greater),
            Condition::Ge { column, value } => Self::cmp(row, *column, value).map(|o| o != Ordering::Less),
            Condition::Lt { column, value } => Self::cmp(row, *column, value).map(|o| o == Ordering::Less),
            Condition::Le { column, value } => Self::cmp(row, *column, value).map(|o| o != Ordering::Greater),
            Condition::In { column, values } => Self::contains(row, *column, values),
            Condition::NotIn { column, values } => Self::contains(row, *column, values).map(|b| !b),
            Condition::IsNull { column } => Some(row.cell(*column).is_none()),
            Condition::IsNotNull { column } => Some(row.cell(*column).is_some()),
            Condition::And { conditions } => {
                let mut saw_null = false;
                for c in conditions {
                    match c.evaluate(row) {
                        Some(false) => return Some(false),
                        None => saw_null = true,
                        Some(true) => {}
                    }
                }
                if saw_null { None } else { Some(true) }
            }
            Condition::Or { conditions } => {
                let mut saw_null = false;
                for c in conditions {
                    match c.evaluate(row) {
                        Some(true) => return Some(true),
                        None => saw_null = true,
                        Some(false) => {}
                    }
                }
                if saw_null { None } else { Some(false) }
            }
            Condition::Not { condition } => condition.evaluate(row).map(|b| !b),
        }
    }

    fn cmp(row: &RowView<'_>, column: Field, value: &Literal) -> Option<Ordering> {
        compare(row.cell(column)?, value)
    }

    fn contains(row: &RowView<'_>, column: Field, values: &[Literal]) -> Option<bool> {
        let cell = row.cell(column)?;
        Some(values.iter().any(|v| compare(cell, v) == Some(Ordering::Equal)))
    }

    /// Load a condition from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, ConditionError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse several clauses and AND them together. No clauses accepts every row.
    pub fn parse_all<S: AsRef<str>>(clauses: &[S]) -> Result<Self, ConditionError> {
        let conditions = clauses
            .iter()
            .map(|c| Condition::parse(c.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Condition::all_of(conditions))
    }

    /// Parse a single clause: `<column> <op> <value>` with `== != > >= < <=`,
    /// or `<column> in a,b` / `<column> not in a,b`.
    pub fn parse(clause: &str) -> Result<Self, ConditionError> {
        let syntax = |message: &str| ConditionError::Syntax {
            clause: clause.to_string(),
            message: message.to_string(),
        };

        let text = clause.trim();
        if text.is_empty() {
            return Err(syntax("empty clause"));
        }

        let (pos, op) = find_operator(text).ok_or_else(|| syntax("expected one of == != > >= < <= in"))?;
        let column: Field = text[..pos].parse()?;
        let raw_value = text[pos + op.len()..].trim();
        if raw_value.is_empty() {
            return Err(syntax("missing value"));
        }

        match op {
            NOT_IN => return Ok(Condition::NotIn { column, values: parse_list(raw_value) }),
            IN => return Ok(Condition::In { column, values: parse_list(raw_value) }),
            _ => {}
        }
        let value = parse_literal(raw_value);

        Ok(match op {
            "==" | "=" => Condition::Eq { column, value },
            "!=" => Condition::Ne { column, value },
            ">=" => Condition::Ge { column, value },
            "<=" => Condition::Le { column, value },
            ">" => Condition::Gt { column, value },
            _ => Condition::Lt { column, value },
        })
    }
}

const NOT_IN: &str = " not in ";
const IN: &str = " in ";
const OPERATORS: [&str; 9] = [NOT_IN, IN, "==", "!=", ">=", "<=", "=", ">", "<"];

/// Leftmost operator outside quotes; longer operators win over their prefixes.
fn find_operator(text: &str) -> Option<(usize, &'static str)> {
    let mut quote: Option<char> = None;
    text.char_indices().find_map(|(i, c)| {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                return None;
            }
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                return None;
            }
            None => {}
        }
        OPERATORS
            .iter()
            .find(|op| text[i..].starts_with(*op))
            .map(|op| (i, *op))
    })
}

fn unquote(s: &str) -> Option<&str> {
    let s = s.trim();
    ['"', '\'']
        .iter()
        .find_map(|q| s.strip_prefix(*q).and_then(|rest| rest.strip_suffix(*q)))
}

fn parse_literal(raw: &str) -> Literal {
    if let Some(quoted) = unquote(raw) {
        return Literal::Text(quoted.to_string());
    }
    let raw = raw.trim();
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Literal::Number(n),
        _ => Literal::Text(raw.to_string()),
    }
}

fn parse_list(raw: &str) -> Vec<Literal> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_literal)
        .collect()
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |values: &[Literal]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
        let joined = |conditions: &[Condition], sep: &str| {
            conditions.iter().map(|c| format!("({})", c)).collect::<Vec<_>>().join(sep)
        };
        match self {
            Condition::All => f.write_str("all rows"),
            Condition::Eq { column, value } => write!(f, "{} == {}", column.name(), value),
            Condition::Ne { column, value } => write!(f, "{} != {}", column.name(), value),
            Condition::Gt { column, value } => write!(f, "{} > {}", column.name(), value),
            Condition::Ge { column, value } => write!(f, "{} >= {}", column.name(), value),
            Condition::Lt { column, value } => write!(f, "{} < {}", column.name(), value),
            Condition::Le { column, value } => write!(f, "{} <= {}", column.name(), value),
            Condition::In { column, values } => write!(f, "{} in {}", column.name(), list(values)),
            Condition::NotIn { column, values } => write!(f, "{} not in {}", column.name(), list(values)),
            Condition::IsNull { column } => write!(f, "{} is null", column.name()),
            Condition::IsNotNull { column } => write!(f, "{} is not null", column.name()),
            Condition::And { conditions } => f.write_str(&joined(conditions, " and ")),
            Condition::Or { conditions } => f.write_str(&joined(conditions, " or ")),
            Condition::Not { condition } => write!(f, "not ({})", condition),
        }
    }
}
