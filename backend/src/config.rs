//! Runtime settings read from the environment.
//!
//! | Variable                  | Default                                  |
//! |---------------------------|------------------------------------------|
//! | `CENSUS_PORT`             | `3000`                                   |
//! | `CENSUS_GROUPING`         | `state,gender,category,former_region`    |
//! | `CENSUS_SUMMARY_GROUPING` | unset (no summary)                       |
//! | `CENSUS_KEEP_TOTALS`      | `false`                                  |
//! | `CENSUS_QUIET`            | `false`                                  |
//!
//! A `.env` file in the working directory is honoured (loaded via `dotenvy`).

use std::env;

use crate::error::ConfigError;
use crate::models::Dimension;

pub const PORT_VAR: &str = "CENSUS_PORT";
pub const GROUPING_VAR: &str = "CENSUS_GROUPING";
pub const SUMMARY_GROUPING_VAR: &str = "CENSUS_SUMMARY_GROUPING";
pub const KEEP_TOTALS_VAR: &str = "CENSUS_KEEP_TOTALS";
pub const QUIET_VAR: &str = "CENSUS_QUIET";

pub const DEFAULT_PORT: u16 = 3000;

/// Process-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// HTTP port for `census serve`.
    pub port: u16,
    /// Cleaner grouping columns.
    pub grouping: Vec<String>,
    /// Summarizer grouping columns; `None` skips the summary step.
    pub summary_grouping: Option<Vec<String>>,
    /// Keep the dataset's pre-aggregated `Total` rows.
    pub keep_totals: bool,
    /// Silence log echo on stderr.
    pub quiet: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            grouping: Dimension::names(),
            summary_grouping: None,
            keep_totals: false,
            quiet: false,
        }
    }
}

impl Settings {
    /// Read settings from environment variables, after loading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match var(PORT_VAR) {
            Some(value) => value.parse().map_err(|_| invalid(PORT_VAR, &value))?,
            None => defaults.port,
        };

        let grouping = match var(GROUPING_VAR) {
            Some(value) => parse_columns(GROUPING_VAR, &value)?,
            None => defaults.grouping,
        };

        let summary_grouping = var(SUMMARY_GROUPING_VAR)
            .map(|value| parse_columns(SUMMARY_GROUPING_VAR, &value))
            .transpose()?;

        let keep_totals = match var(KEEP_TOTALS_VAR) {
            Some(value) => parse_bool(KEEP_TOTALS_VAR, &value)?,
            None => defaults.keep_totals,
        };

        let quiet = match var(QUIET_VAR) {
            Some(value) => parse_bool(QUIET_VAR, &value)?,
            None => defaults.quiet,
        };

        Ok(Self {
            port,
            grouping,
            summary_grouping,
            keep_totals,
            quiet,
        })
    }
}

/// Split a comma-separated column list, dropping blanks.
pub fn split_columns(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

fn parse_columns(key: &str, value: &str) -> Result<Vec<String>, ConfigError> {
    let columns = split_columns(value);
    if columns.is_empty() {
        return Err(invalid(key, value));
    }
    Ok(columns)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.port, 3000);
        assert_eq!(s.grouping, vec!["state", "gender", "category", "former_region"]);
        assert!(s.summary_grouping.is_none());
        assert!(!s.keep_totals);
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("CENSUS_PORT", "8080"),
            ("CENSUS_GROUPING", " state , gender "),
            ("CENSUS_SUMMARY_GROUPING", "state"),
            ("CENSUS_KEEP_TOTALS", "yes"),
            ("CENSUS_QUIET", "1"),
        ])
        .unwrap();
        assert_eq!(s.port, 8080);
        assert_eq!(s.grouping, vec!["state", "gender"]);
        assert_eq!(s.summary_grouping, Some(vec!["state".to_string()]));
        assert!(s.keep_totals);
        assert!(s.quiet);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let s = settings(&[("CENSUS_PORT", "  "), ("CENSUS_SUMMARY_GROUPING", "")]).unwrap();
        assert_eq!(s.port, DEFAULT_PORT);
        assert!(s.summary_grouping.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let err = settings(&[("CENSUS_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("CENSUS_PORT"));

        assert!(settings(&[("CENSUS_KEEP_TOTALS", "maybe")]).is_err());
        assert!(settings(&[("CENSUS_GROUPING", " , ,")]).is_err());
    }

    #[test]
    fn test_split_columns() {
        assert_eq!(split_columns("state,,gender "), vec!["state", "gender"]);
        assert!(split_columns("").is_empty());
    }
}
