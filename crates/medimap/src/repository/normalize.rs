//! Cell-level normalization applied while building facilities.

use itertools::Itertools;
use regex::{Regex, RegexBuilder};

use crate::error::Result;
use crate::proximity::Coordinate;
use crate::schema::OperatingDay;

pub const DEFAULT_EMERGENCY_KEYWORDS: [&str; 2] = ["응급", "emergency"];
pub const DEFAULT_DEPARTMENT_SEPARATORS: [char; 5] = [',', '/', '|', ';', '·'];

/// Exact (case-insensitive) values read as "yes".
const TRUTHY_TOKENS: [&str; 7] = ["y", "yes", "true", "t", "o", "운영", "er"];
const NEGATION_MARKER: &str = "미운영";

/// The single rule turning an emergency-room cell into a boolean.
///
/// After trimming, a value is true when it
/// - is one of `y`, `yes`, `true`, `t`, `o`, `운영`, `er` (any case),
/// - parses as a number ≥ 1,
/// - or contains one of the configured keywords (any case).
///
/// Values containing `미운영` are always false, as are blanks.
#[derive(Debug, Clone)]
pub struct EmergencyRule {
    keywords: Vec<String>,
    pattern: Option<Regex>,
}

impl EmergencyRule {
    pub fn new<I, S>(keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        let pattern = if keywords.is_empty() {
            None
        } else {
            let alternation = keywords.iter().map(|k| regex::escape(k)).join("|");
            Some(RegexBuilder::new(&alternation).case_insensitive(true).build()?)
        };
        Ok(Self { keywords, pattern })
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_truthy(&self, value: Option<&str>) -> bool {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return false;
        };
        if value.contains(NEGATION_MARKER) {
            return false;
        }
        let lowered = value.to_lowercase();
        if TRUTHY_TOKENS.contains(&lowered.as_str()) {
            return true;
        }
        if let Ok(number) = lowered.parse::<f64>() {
            return number.is_finite() && number >= 1.0;
        }
        self.pattern.as_ref().is_some_and(|p| p.is_match(value))
    }
}

impl Default for EmergencyRule {
    fn default() -> Self {
        Self::new(DEFAULT_EMERGENCY_KEYWORDS).expect("escaped literals always compile")
    }
}

/// Split a multi-valued department cell, dropping blanks and duplicates.
pub fn split_departments(value: &str, separators: &[char]) -> Vec<String> {
    value
        .split(separators)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unique()
        .map(str::to_string)
        .collect()
}

/// Days named in a weekday-list cell such as `월,화,수`, `mon tue` or `월화수`.
///
/// Tokens are split on `separators` and whitespace; unknown tokens are skipped.
pub fn parse_weekdays(value: &str, separators: &[char]) -> Vec<OperatingDay> {
    value
        .split(|c: char| c.is_whitespace() || separators.contains(&c))
        .filter(|token| !token.is_empty())
        .flat_map(|token| match token.parse::<OperatingDay>() {
            Ok(day) => vec![day],
            // Run-together single-character days
            Err(_) => token
                .chars()
                .map(|c| c.to_string().parse::<OperatingDay>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .unwrap_or_default(),
        })
        .unique()
        .collect()
}

pub fn parse_coordinate(lat: Option<&str>, lon: Option<&str>) -> Option<Coordinate> {
    let lat = lat?.trim().parse::<f64>().ok()?;
    let lon = lon?.trim().parse::<f64>().ok()?;
    Coordinate::checked(lat, lon)
}

/// Trimmed, non-empty cell text.
pub fn clean(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
