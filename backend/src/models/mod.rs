//! Domain models for the census pipeline.
//!
//! This module contains the fixed vocabularies the cleaner decodes into:
//!
//! - [`Gender`] - Decoded from the `Variable Name` column
//! - [`age_category`] - 14 source age brackets bucketed into 6 categories
//! - [`FormerRegion`] - Pre-2011 region derived from the state name
//! - [`Dimension`] - Columns a cleaned table can be grouped by
//! - [`CensusRecord`] - One cleaned row, before aggregation

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Source Schema
// =============================================================================

/// Variable column, e.g. `Population, Male (Number)`.
pub const VARIABLE_NAME: &str = "Variable Name";
/// Age bracket column, e.g. `20 to 24`.
pub const AGE_NAME: &str = "Age Name";
/// State column.
pub const REGION_NAME: &str = "Region Name";
/// Population count column.
pub const VALUE_COLUMN: &str = "2008";

/// Source columns the cleaner reads; everything else in the export is ignored.
pub const REQUIRED_COLUMNS: [&str; 4] = [VARIABLE_NAME, AGE_NAME, REGION_NAME, VALUE_COLUMN];

// =============================================================================
// Gender
// =============================================================================

static VARIABLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Population, (?P<gender>[A-Za-z]+) \(Number\)$").expect("valid variable pattern")
});

/// Gender encoded in the census `Variable Name` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    /// Pre-aggregated rows covering both genders.
    Total,
}

impl Gender {
    /// Decode `Population, <Gender> (Number)`.
    ///
    /// Returns `None` for anything else so the caller can report the row.
    pub fn from_variable_name(value: &str) -> Option<Self> {
        let caps = VARIABLE_PATTERN.captures(value.trim())?;
        caps.name("gender")?.as_str().parse().ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Total => "Total",
        }
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            "Total" => Ok(Gender::Total),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Age Categories
// =============================================================================

/// Source age bracket → age category.
pub const AGE_BUCKETS: [(&str, &str); 14] = [
    ("0 to 4", "0-14"),
    ("5 to 9", "0-14"),
    ("10 to 14", "0-14"),
    ("15 to 19", "15-24"),
    ("20 to 24", "15-24"),
    ("25 to 29", "25-34"),
    ("30 to 34", "25-34"),
    ("35 to 39", "35-44"),
    ("40 to 44", "35-44"),
    ("45 to 49", "45-54"),
    ("50 to 54", "45-54"),
    ("55 to 59", "55-64"),
    ("60 to 64", "55-64"),
    ("65+", "65 and above"),
];

/// Bucket an `Age Name` value. Labels outside [`AGE_BUCKETS`] pass through.
pub fn age_category(age: &str) -> &str {
    AGE_BUCKETS
        .iter()
        .find(|(bracket, _)| *bracket == age)
        .map(|(_, category)| *category)
        .unwrap_or(age)
}

// =============================================================================
// Former Regions
// =============================================================================

/// The three historical regions of South Sudan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormerRegion {
    GreaterUpperNile,
    GreaterEquatoria,
    GreaterBahrElGhazal,
}

/// One step of the region cascade.
pub struct RegionRule {
    /// Human-readable form of the predicate, for `census mappings`.
    pub description: &'static str,
    pub matches: fn(&str) -> bool,
    pub region: FormerRegion,
}

/// Ordered, first match wins.
pub const REGION_RULES: [RegionRule; 3] = [
    RegionRule {
        description: "state is Upper Nile, Unity or Jonglei",
        matches: |state| matches!(state, "Upper Nile" | "Unity" | "Jonglei"),
        region: FormerRegion::GreaterUpperNile,
    },
    RegionRule {
        description: "state ends with \"Equatoria\"",
        matches: |state| state.ends_with("Equatoria"),
        region: FormerRegion::GreaterEquatoria,
    },
    RegionRule {
        description: "state contains \"Ghazal\"",
        matches: |state| state.contains("Ghazal"),
        region: FormerRegion::GreaterBahrElGhazal,
    },
];

/// Region assigned when no rule matches.
pub const DEFAULT_REGION: FormerRegion = FormerRegion::GreaterBahrElGhazal;

impl FormerRegion {
    /// Run the rule cascade for a state name.
    pub fn for_state(state: &str) -> Self {
        REGION_RULES
            .iter()
            .find(|rule| (rule.matches)(state))
            .map(|rule| rule.region)
            .unwrap_or(DEFAULT_REGION)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FormerRegion::GreaterUpperNile => "Greater Upper Nile",
            FormerRegion::GreaterEquatoria => "Greater Equatoria",
            FormerRegion::GreaterBahrElGhazal => "Greater Bahr el Ghazal",
        }
    }
}

impl fmt::Display for FormerRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Dimensions
// =============================================================================

/// Columns of a cleaned record that can be grouped on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    State,
    Gender,
    Category,
    FormerRegion,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::State,
        Dimension::Gender,
        Dimension::Category,
        Dimension::FormerRegion,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dimension::State => "state",
            Dimension::Gender => "gender",
            Dimension::Category => "category",
            Dimension::FormerRegion => "former_region",
        }
    }

    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|d| d.name().to_string()).collect()
    }
}

impl FromStr for Dimension {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|d| d.name() == s).ok_or(())
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Cleaned Record
// =============================================================================

/// A raw row after decoding, filtering, null-dropping and renaming.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CensusRecord {
    pub state: String,
    pub gender: Gender,
    pub category: String,
    pub former_region: FormerRegion,
    pub population: u64,
}

impl CensusRecord {
    /// Value of a grouping column.
    pub fn dimension(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::State => &self.state,
            Dimension::Gender => self.gender.as_str(),
            Dimension::Category => &self.category,
            Dimension::FormerRegion => self.former_region.label(),
        }
    }
}
