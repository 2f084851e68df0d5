//! Declarative header alias table.
//!
//! One table drives detection for every dataset. It is plain configuration and can be
//! read from JSON so data producers with new header conventions only need a file edit:
//!
//! ```json
//! {
//!   "name": { "aliases": ["기관명", "hospital"] },
//!   "emergency": { "aliases": ["응급실", "emergency"], "exact_aliases": ["er"] },
//!   "day:sun": { "aliases": ["일", "일요일", "sun"], "exact_only": true }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{FieldKey, OperatingDay};
use crate::error::Result;

/// Ordered header aliases for one canonical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCandidates {
    /// Tried in order for an exact, case-insensitive match; first hit wins.
    pub aliases: Vec<String>,
    /// Short aliases that must equal the whole header. Tried after `aliases` in the exact pass,
    /// never used for substring matching.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exact_aliases: Vec<String>,
    /// Skip the substring fallback.
    #[serde(default)]
    pub exact_only: bool,
}

impl ColumnCandidates {
    pub fn new<I, S>(aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            aliases: aliases.into_iter().map(Into::into).collect(),
            exact_aliases: Vec::new(),
            exact_only: false,
        }
    }

    pub fn exact<I, S>(aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exact_only: true,
            ..Self::new(aliases)
        }
    }

    /// Add aliases that only match a header exactly.
    #[must_use]
    pub fn with_exact<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exact_aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Every alias in exact-pass order.
    pub fn exact_pass(&self) -> impl Iterator<Item = &str> {
        self.aliases
            .iter()
            .chain(&self.exact_aliases)
            .map(String::as_str)
    }
}

/// Day spellings short enough to occur inside unrelated headers (`월`, `mon`).
fn is_short_day_alias(alias: &str) -> bool {
    alias.chars().count() == 1 || (alias.is_ascii() && alias.len() <= 3)
}

/// Canonical field → candidate header names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    entries: BTreeMap<FieldKey, ColumnCandidates>,
}

impl Default for AliasTable {
    /// Header conventions seen in Korean public hospital datasets plus common English names.
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            FieldKey::Latitude,
            ColumnCandidates::new(["lat", "latitude", "y", "위도", "위도_", "위도(위도)"]),
        );
        entries.insert(
            FieldKey::Longitude,
            ColumnCandidates::new(["lon", "lng", "longitude", "x", "경도", "경도_", "경도(경도)"]),
        );
        entries.insert(
            FieldKey::Name,
            ColumnCandidates::new(["name", "병원명", "이름", "병원", "상호", "의료기관명", "기관명"]),
        );
        entries.insert(
            FieldKey::Address,
            ColumnCandidates::new(["주소", "address", "addr", "소재지", "지역", "시군구", "지역명"]),
        );
        entries.insert(
            FieldKey::Department,
            ColumnCandidates::new(["진료과목", "진료과", "department", "dept", "과목", "specialty"]),
        );
        entries.insert(
            FieldKey::Phone,
            ColumnCandidates::new(["전화번호", "전화", "연락처", "phone", "tel"]),
        );
        entries.insert(
            FieldKey::Url,
            ColumnCandidates::new(["url", "홈페이지", "website", "homepage"]),
        );
        entries.insert(
            FieldKey::EmergencyFlag,
            ColumnCandidates::new(["응급실", "응급", "emergency"]).with_exact(["er"]),
        );
        entries.insert(
            FieldKey::Hours,
            ColumnCandidates::new(["운영시간", "영업시간", "진료시간", "시간", "hours", "open"]),
        );
        entries.insert(
            FieldKey::Weekdays,
            ColumnCandidates::new(["영업요일", "운영요일", "진료요일", "weekdays"])
                .with_exact(["요일", "days"]),
        );
        for day in OperatingDay::ALL {
            let (short, long): (Vec<&str>, Vec<&str>) =
                day.aliases().into_iter().partition(|a| is_short_day_alias(a));
            entries.insert(
                FieldKey::OperatingDay(day),
                ColumnCandidates::new(long).with_exact(short),
            );
        }
        Self { entries }
    }
}

impl AliasTable {
    /// A table with no entries; every field is unmapped until set.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn get(&self, key: FieldKey) -> Option<&ColumnCandidates> {
        self.entries.get(&key)
    }

    pub fn set(&mut self, key: FieldKey, candidates: ColumnCandidates) {
        self.entries.insert(key, candidates);
    }

    /// Overlay `other` on this table; `other` wins for every key it defines.
    pub fn merge(mut self, other: Self) -> Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &ColumnCandidates)> {
        self.entries.iter().map(|(key, candidates)| (*key, candidates))
    }
}
