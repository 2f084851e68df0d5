//! Multi-criteria facility filtering.
//!
//! Every criterion is optional and the active ones are ANDed. Filtering never reorders: the
//! output is the input sequence with non-matching facilities removed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::repository::Facility;
use crate::schema::OperatingDay;

/// How several keywords combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordMode {
    /// Every keyword must appear
    #[default]
    And,
    /// At least one keyword must appear
    Or,
}

/// Emergency-room requirement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyFilter {
    #[default]
    Any,
    Operating,
    NotOperating,
}

impl EmergencyFilter {
    fn accepts(self, emergency: bool) -> bool {
        match self {
            Self::Any => true,
            Self::Operating => emergency,
            Self::NotOperating => !emergency,
        }
    }
}

/// What the caller is looking for. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    /// Substring of the address
    pub region: Option<String>,
    /// Any of these must be a substring of the address
    pub regions: Vec<String>,
    /// Substring of the address
    pub address: Option<String>,
    /// Matched against name and departments
    pub keywords: Vec<String>,
    pub keyword_mode: KeywordMode,
    /// Facility must offer at least one of these
    pub departments: BTreeSet<String>,
    /// Facility must be open on this day
    pub operating_day: Option<OperatingDay>,
    /// Substring of the hours column or of any day's hours
    pub hours_text: Option<String>,
    pub emergency: EmergencyFilter,
}

/// Lowercased, trimmed, non-empty.
fn needle(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// [`FilterCriteria`] normalized once per query.
struct Prepared {
    region: Option<String>,
    regions: Vec<String>,
    address: Option<String>,
    keywords: Vec<String>,
    keyword_mode: KeywordMode,
    departments: BTreeSet<String>,
    operating_day: Option<OperatingDay>,
    hours_text: Option<String>,
    emergency: EmergencyFilter,
}

impl Prepared {
    fn new(criteria: &FilterCriteria) -> Self {
        Self {
            region: criteria.region.as_deref().and_then(needle),
            regions: criteria.regions.iter().filter_map(|r| needle(r)).collect(),
            address: criteria.address.as_deref().and_then(needle),
            keywords: criteria.keywords.iter().filter_map(|k| needle(k)).collect(),
            keyword_mode: criteria.keyword_mode,
            departments: criteria.departments.iter().filter_map(|d| needle(d)).collect(),
            operating_day: criteria.operating_day,
            hours_text: criteria.hours_text.as_deref().and_then(needle),
            emergency: criteria.emergency,
        }
    }

    fn is_unconstrained(&self) -> bool {
        self.region.is_none()
            && self.regions.is_empty()
            && self.address.is_none()
            && self.keywords.is_empty()
            && self.departments.is_empty()
            && self.operating_day.is_none()
            && self.hours_text.is_none()
            && self.emergency == EmergencyFilter::Any
    }

    fn matches(&self, facility: &Facility) -> bool {
        self.emergency.accepts(facility.has_emergency_room())
            && self.matches_address(facility)
            && self.matches_keywords(facility)
            && self.matches_departments(facility)
            && self.matches_schedule(facility)
    }

    fn matches_address(&self, facility: &Facility) -> bool {
        if self.region.is_none() && self.regions.is_empty() && self.address.is_none() {
            return true;
        }
        let address = facility.address().to_lowercase();
        self.region.as_ref().is_none_or(|r| address.contains(r.as_str()))
            && self.address.as_ref().is_none_or(|a| address.contains(a.as_str()))
            && (self.regions.is_empty() || self.regions.iter().any(|r| address.contains(r.as_str())))
    }

    fn matches_keywords(&self, facility: &Facility) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let text = facility.search_text();
        match self.keyword_mode {
            KeywordMode::And => self.keywords.iter().all(|k| text.contains(k.as_str())),
            KeywordMode::Or => self.keywords.iter().any(|k| text.contains(k.as_str())),
        }
    }

    fn matches_departments(&self, facility: &Facility) -> bool {
        self.departments.is_empty()
            || facility
                .departments()
                .iter()
                .any(|d| self.departments.contains(&d.trim().to_lowercase()))
    }

    fn matches_schedule(&self, facility: &Facility) -> bool {
        if self
            .operating_day
            .is_some_and(|day| !facility.is_open_on(day))
        {
            return false;
        }
        let Some(text) = &self.hours_text else {
            return true;
        };
        facility.hours().is_some_and(|h| contains_ci(h, text))
            || facility.schedule().values().any(|h| contains_ci(h, text))
    }
}

impl FilterCriteria {
    pub fn builder() -> FilterCriteriaBuilder {
        FilterCriteriaBuilder::default()
    }

    /// True when no criterion would exclude anything.
    pub fn is_unconstrained(&self) -> bool {
        Prepared::new(self).is_unconstrained()
    }

    pub fn matches(&self, facility: &Facility) -> bool {
        Prepared::new(self).matches(facility)
    }
}

/// Fluent construction of [`FilterCriteria`].
#[derive(Debug, Clone, Default)]
pub struct FilterCriteriaBuilder {
    criteria: FilterCriteria,
}

impl FilterCriteriaBuilder {
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.criteria.region = Some(region.into());
        self
    }

    /// Add to the multi-select region list (any may match)
    pub fn regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria.regions.extend(regions.into_iter().map(Into::into));
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.criteria.address = Some(address.into());
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.criteria.keywords.push(keyword.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    /// Split free text on whitespace into keywords, e.g. `"강남 내과"`
    pub fn keyword_query(self, query: &str) -> Self {
        self.keywords(query.split_whitespace())
    }

    pub fn keyword_mode(mut self, mode: KeywordMode) -> Self {
        self.criteria.keyword_mode = mode;
        self
    }

    pub fn department(mut self, department: impl Into<String>) -> Self {
        self.criteria.departments.insert(department.into());
        self
    }

    pub fn departments<I, S>(mut self, departments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria
            .departments
            .extend(departments.into_iter().map(Into::into));
        self
    }

    pub fn operating_day(mut self, day: OperatingDay) -> Self {
        self.criteria.operating_day = Some(day);
        self
    }

    pub fn hours_text(mut self, text: impl Into<String>) -> Self {
        self.criteria.hours_text = Some(text.into());
        self
    }

    pub fn emergency(mut self, filter: EmergencyFilter) -> Self {
        self.criteria.emergency = filter;
        self
    }

    /// Only facilities with an emergency room
    pub fn emergency_only(self) -> Self {
        self.emergency(EmergencyFilter::Operating)
    }

    pub fn build(self) -> FilterCriteria {
        self.criteria
    }
}

/// Facilities matching `criteria`, in input order.
#[instrument(name = "Filter facilities", level = "debug", skip_all)]
pub fn apply<'a, I>(facilities: I, criteria: &FilterCriteria) -> Vec<&'a Facility>
where
    I: IntoIterator<Item = &'a Facility>,
{
    let prepared = Prepared::new(criteria);
    if prepared.is_unconstrained() {
        return facilities.into_iter().collect();
    }
    let matched: Vec<&'a Facility> = facilities
        .into_iter()
        .filter(|facility| prepared.matches(facility))
        .collect();
    debug!(matched = matched.len(), "Filter applied");
    matched
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::proximity::Coordinate;

    fn facilities() -> Vec<Facility> {
        let here = Coordinate::new(37.5, 127.0);
        vec![
            Facility::builder(0, "강남연세내과의원", here)
                .address("서울특별시 강남구 테헤란로 123")
                .departments(["내과"])
                .open_on(OperatingDay::Mon, "09:00-18:00")
                .build(),
            Facility::builder(1, "강남세브란스병원", here)
                .address("서울특별시 강남구 언주로 211")
                .departments(["정형외과", "응급의학과"])
                .emergency(true)
                .open_on(OperatingDay::Mon, "09:00-18:00")
                .open_on(OperatingDay::Holiday, "24시간 응급")
                .build(),
            Facility::builder(2, "마포소아청소년과의원", here)
                .address("서울특별시 마포구 월드컵로 10")
                .departments(["소아청소년과", "내과"])
                .open_on(OperatingDay::Sun, "10:00-13:00")
                .hours("평일 09:00-18:00")
                .build(),
            Facility::builder(3, "Seoul Dental", here)
                .address("Seoul Songpa-gu")
                .departments(["Dentistry"])
                .build(),
        ]
    }

    fn ids(matched: &[&Facility]) -> Vec<usize> {
        matched.iter().map(|f| f.id()).collect()
    }

    #[test]
    fn test_no_criteria_is_identity() {
        let all = facilities();
        let matched = apply(&all, &FilterCriteria::default());
        assert_eq!(ids(&matched), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_keyword_and_or() {
        let all = facilities();
        let and = FilterCriteria::builder().keywords(["내과", "강남"]).build();
        assert_eq!(ids(&apply(&all, &and)), vec![0]);

        let or = FilterCriteria::builder()
            .keywords(["내과", "강남"])
            .keyword_mode(KeywordMode::Or)
            .build();
        assert_eq!(ids(&apply(&all, &or)), vec![0, 1, 2]);
    }

    #[test]
    fn test_keywords_match_departments_and_ignore_case_and_blanks() {
        let all = facilities();
        let criteria = FilterCriteria::builder().keyword_query("  DENTISTRY  ").build();
        assert_eq!(ids(&apply(&all, &criteria)), vec![3]);

        let criteria = FilterCriteria::builder().keywords(["", "  "]).build();
        assert!(criteria.is_unconstrained());
        assert_eq!(apply(&all, &criteria).len(), 4);
    }

    #[test]
    fn test_region_variants() {
        let all = facilities();
        let criteria = FilterCriteria::builder().region("강남구").build();
        assert_eq!(ids(&apply(&all, &criteria)), vec![0, 1]);

        let criteria = FilterCriteria::builder().regions(["마포구", "songpa"]).build();
        assert_eq!(ids(&apply(&all, &criteria)), vec![2, 3]);

        let criteria = FilterCriteria::builder()
            .region("강남구")
            .address("언주로")
            .build();
        assert_eq!(ids(&apply(&all, &criteria)), vec![1]);

        let criteria = FilterCriteria::builder().region("없는동네").build();
        assert!(apply(&all, &criteria).is_empty());
    }

    #[test]
    fn test_departments_intersect() {
        let all = facilities();
        let criteria = FilterCriteria::builder()
            .departments(["내과", "정형외과"])
            .build();
        assert_eq!(ids(&apply(&all, &criteria)), vec![0, 1, 2]);

        // Set membership, not substring: 정형외과 is not 외과
        let criteria = FilterCriteria::builder().department("외과").build();
        assert!(apply(&all, &criteria).is_empty());
    }

    #[test]
    fn test_operating_day_and_hours_text() {
        let all = facilities();
        let criteria = FilterCriteria::builder()
            .operating_day(OperatingDay::Sun)
            .build();
        assert_eq!(ids(&apply(&all, &criteria)), vec![2]);

        let criteria = FilterCriteria::builder().hours_text("24시간").build();
        assert_eq!(ids(&apply(&all, &criteria)), vec![1]);

        let criteria = FilterCriteria::builder().hours_text("평일").build();
        assert_eq!(ids(&apply(&all, &criteria)), vec![2]);
    }

    #[test]
    fn test_emergency_filter() {
        let all = facilities();
        let criteria = FilterCriteria::builder().emergency_only().build();
        assert_eq!(ids(&apply(&all, &criteria)), vec![1]);

        let criteria = FilterCriteria::builder()
            .emergency(EmergencyFilter::NotOperating)
            .build();
        assert_eq!(ids(&apply(&all, &criteria)), vec![0, 2, 3]);
    }

    #[test]
    fn test_dimensions_are_anded() {
        let all = facilities();
        let criteria = FilterCriteria::builder()
            .region("강남")
            .department("내과")
            .operating_day(OperatingDay::Mon)
            .build();
        assert_eq!(ids(&apply(&all, &criteria)), vec![0]);
    }

    #[test]
    fn test_criteria_deserialize_with_defaults() {
        let json = r#"{ "keywords": ["내과"], "keyword_mode": "or", "emergency": "operating" }"#;
        let criteria: FilterCriteria = serde_json::from_str(json).unwrap();
        assert_eq!(criteria.keyword_mode, KeywordMode::Or);
        assert_eq!(criteria.emergency, EmergencyFilter::Operating);
        assert!(criteria.region.is_none());
    }

    fn criteria_strategy() -> impl Strategy<Value = FilterCriteria> {
        let words = prop::sample::select(vec!["내과", "강남", "마포", "응급", "dental", "", "없음"]);
        (
            prop::option::of(words.clone()),
            prop::collection::vec(words.clone(), 0..3),
            any::<bool>(),
            prop::option::of(prop::sample::select(OperatingDay::ALL.to_vec())),
            prop::sample::select(vec![
                EmergencyFilter::Any,
                EmergencyFilter::Operating,
                EmergencyFilter::NotOperating,
            ]),
        )
            .prop_map(|(region, keywords, or, day, emergency)| FilterCriteria {
                region: region.map(str::to_string),
                keywords: keywords.into_iter().map(str::to_string).collect(),
                keyword_mode: if or { KeywordMode::Or } else { KeywordMode::And },
                operating_day: day,
                emergency,
                ..FilterCriteria::default()
            })
    }

    proptest! {
        #[test]
        fn prop_apply_is_idempotent_and_order_preserving(criteria in criteria_strategy()) {
            let all = facilities();
            let once = apply(&all, &criteria);
            let twice = apply(once.iter().copied(), &criteria);

            prop_assert_eq!(ids(&once), ids(&twice));
            prop_assert!(ids(&once).windows(2).all(|w| w[0] < w[1]));
        }
    }
}
