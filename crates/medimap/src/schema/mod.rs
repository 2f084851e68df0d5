//! Column detection for arbitrary hospital CSVs.
//!
//! Source files name their columns however the publisher liked (`위도`, `lat`, `Y`,
//! `의료기관명`, ...). [`SchemaDetector`] maps those headers onto the fixed set of
//! [`FieldKey`]s every [`Facility`](crate::Facility) exposes.
//!
//! For each field the alias list is walked twice:
//! 1. exact, case-insensitive equality, alias by alias, first alias with a matching header wins
//!    (`exact_aliases` are tried after the regular ones);
//! 2. substring containment, header by header in column order, first header containing any
//!    regular alias wins (skipped for `exact_only` candidates).
//!
//! Latitude, longitude and name are required; everything else may stay unmapped.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

mod aliases;

pub use aliases::{AliasTable, ColumnCandidates};
pub use error::SchemaError;
use error::Result;

/// Opening-day columns, Monday through Sunday plus public holidays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingDay {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
    Holiday,
}

impl OperatingDay {
    pub const ALL: [Self; 8] = [
        Self::Mon,
        Self::Tue,
        Self::Wed,
        Self::Thu,
        Self::Fri,
        Self::Sat,
        Self::Sun,
        Self::Holiday,
    ];

    /// Short code used in alias-table keys (`day:mon`).
    pub fn code(self) -> &'static str {
        match self {
            Self::Mon => "mon",
            Self::Tue => "tue",
            Self::Wed => "wed",
            Self::Thu => "thu",
            Self::Fri => "fri",
            Self::Sat => "sat",
            Self::Sun => "sun",
            Self::Holiday => "holiday",
        }
    }

    /// Korean column label as used by public datasets.
    pub fn korean(self) -> &'static str {
        match self {
            Self::Mon => "월",
            Self::Tue => "화",
            Self::Wed => "수",
            Self::Thu => "목",
            Self::Fri => "금",
            Self::Sat => "토",
            Self::Sun => "일",
            Self::Holiday => "공휴일",
        }
    }

    /// Every spelling accepted for this day, both as a header alias and by [`FromStr`].
    pub fn aliases(self) -> [&'static str; 4] {
        match self {
            Self::Mon => ["월", "월요일", "mon", "monday"],
            Self::Tue => ["화", "화요일", "tue", "tuesday"],
            Self::Wed => ["수", "수요일", "wed", "wednesday"],
            Self::Thu => ["목", "목요일", "thu", "thursday"],
            Self::Fri => ["금", "금요일", "fri", "friday"],
            Self::Sat => ["토", "토요일", "sat", "saturday"],
            Self::Sun => ["일", "일요일", "sun", "sunday"],
            Self::Holiday => ["공휴일", "휴일", "holiday", "holidays"],
        }
    }
}

impl fmt::Display for OperatingDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.korean())
    }
}

impl FromStr for OperatingDay {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| day.aliases().contains(&needle.as_str()))
            .ok_or_else(|| SchemaError::UnknownDay(s.to_string()))
    }
}

/// A canonical facility attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldKey {
    Latitude,
    Longitude,
    Name,
    Address,
    Department,
    Phone,
    Url,
    EmergencyFlag,
    /// A single free-text opening hours column
    Hours,
    /// One column listing open days, e.g. `월,화,수`
    Weekdays,
    OperatingDay(OperatingDay),
}

impl FieldKey {
    /// Fields without which a facility cannot be placed or labelled.
    pub const REQUIRED: [Self; 3] = [Self::Latitude, Self::Longitude, Self::Name];

    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::Latitude,
            Self::Longitude,
            Self::Name,
            Self::Address,
            Self::Department,
            Self::Phone,
            Self::Url,
            Self::EmergencyFlag,
            Self::Hours,
            Self::Weekdays,
        ]
        .into_iter()
        .chain(OperatingDay::ALL.into_iter().map(Self::OperatingDay))
    }

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latitude => f.write_str("latitude"),
            Self::Longitude => f.write_str("longitude"),
            Self::Name => f.write_str("name"),
            Self::Address => f.write_str("address"),
            Self::Department => f.write_str("department"),
            Self::Phone => f.write_str("phone"),
            Self::Url => f.write_str("url"),
            Self::EmergencyFlag => f.write_str("emergency"),
            Self::Hours => f.write_str("hours"),
            Self::Weekdays => f.write_str("weekdays"),
            Self::OperatingDay(day) => write!(f, "day:{}", day.code()),
        }
    }
}

impl FromStr for FieldKey {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(day) = s.strip_prefix("day:") {
            return day.parse().map(Self::OperatingDay);
        }
        Self::all()
            .find(|key| key.to_string() == s)
            .ok_or_else(|| SchemaError::UnknownField(s.to_string()))
    }
}

impl TryFrom<String> for FieldKey {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FieldKey> for String {
    fn from(key: FieldKey) -> Self {
        key.to_string()
    }
}

/// A detected source column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    /// Position in the source header row
    pub index: usize,
    /// Header text as it appears in the source
    pub name: String,
}

/// Result of detection: each canonical field mapped to zero or one source column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldMap {
    columns: BTreeMap<FieldKey, ColumnRef>,
}

impl FieldMap {
    pub fn get(&self, key: FieldKey) -> Option<&ColumnRef> {
        self.columns.get(&key)
    }

    pub fn index(&self, key: FieldKey) -> Option<usize> {
        self.get(key).map(|c| c.index)
    }

    pub fn column_name(&self, key: FieldKey) -> Option<&str> {
        self.get(key).map(|c| c.name.as_str())
    }

    pub fn is_mapped(&self, key: FieldKey) -> bool {
        self.columns.contains_key(&key)
    }

    /// Required fields that have no column.
    pub fn missing_required(&self) -> Vec<FieldKey> {
        FieldKey::REQUIRED
            .into_iter()
            .filter(|key| !self.is_mapped(*key))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &ColumnRef)> {
        self.columns.iter().map(|(key, column)| (*key, column))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn insert(&mut self, key: FieldKey, column: ColumnRef) {
        self.columns.insert(key, column);
    }
}

/// Maps source headers onto [`FieldKey`]s using an [`AliasTable`].
#[derive(Debug, Clone, Default)]
pub struct SchemaDetector {
    aliases: AliasTable,
}

impl SchemaDetector {
    pub fn new(aliases: AliasTable) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Detect every field and fail if a required one is missing.
    #[instrument(name = "Detect schema", level = "debug", skip_all, fields(headers = headers.len()))]
    pub fn detect<S: AsRef<str>>(&self, headers: &[S]) -> Result<FieldMap> {
        let map = self.detect_columns(headers);
        let missing = map.missing_required();
        if !missing.is_empty() {
            let names: Vec<&str> = headers.iter().map(|h| h.as_ref()).collect();
            warn!(
                missing = %missing.iter().join(", "),
                headers = %names.join(", "),
                "Required columns not found"
            );
            return Err(SchemaError::Incomplete { missing });
        }
        Ok(map)
    }

    /// Detect every field; unmapped fields are simply absent from the map.
    pub fn detect_columns<S: AsRef<str>>(&self, headers: &[S]) -> FieldMap {
        let lowered: Vec<String> = headers
            .iter()
            .map(|h| h.as_ref().trim().to_lowercase())
            .collect();

        let mut map = FieldMap::default();
        for (key, candidates) in self.aliases.iter() {
            match find_column(candidates, &lowered) {
                Some(index) => {
                    let name = headers[index].as_ref().trim().to_string();
                    debug!(field = %key, column = %name, "Column detected");
                    map.insert(key, ColumnRef { index, name });
                }
                None => debug!(field = %key, "No column for field"),
            }
        }
        map
    }

    /// Column index for one field, without validation.
    pub fn detect_field<S: AsRef<str>>(&self, key: FieldKey, headers: &[S]) -> Option<usize> {
        let candidates = self.aliases.get(key)?;
        let lowered: Vec<String> = headers
            .iter()
            .map(|h| h.as_ref().trim().to_lowercase())
            .collect();
        find_column(candidates, &lowered)
    }
}

fn find_column(candidates: &ColumnCandidates, lowered_headers: &[String]) -> Option<usize> {
    for alias in lowered(candidates.exact_pass()) {
        if let Some(index) = lowered_headers.iter().position(|h| *h == alias) {
            return Some(index);
        }
    }
    if candidates.exact_only {
        return None;
    }
    let substrings = lowered(candidates.aliases.iter().map(String::as_str));
    lowered_headers
        .iter()
        .position(|h| substrings.iter().any(|alias| h.contains(alias.as_str())))
}

fn lowered<'a>(aliases: impl Iterator<Item = &'a str>) -> Vec<String> {
    aliases
        .map(|a| a.trim().to_lowercase())
        .filter(|a| !a.is_empty())
        .collect()
}

mod error {
    use itertools::Itertools;
    use thiserror::Error;

    use super::FieldKey;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum SchemaError {
        #[error("Schema incomplete, no column found for: {}", .missing.iter().join(", "))]
        Incomplete { missing: Vec<FieldKey> },
        #[error("Unknown field key: {0}")]
        UnknownField(String),
        #[error("Unknown operating day: {0}")]
        UnknownDay(String),
    }
    pub type Result<T> = std::result::Result<T, SchemaError>;
}
