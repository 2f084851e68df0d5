//! Filter first, recommend nearby when nothing matches.

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::SearchConfig;
use crate::filter::{FilterCriteria, apply};
use crate::proximity::{Coordinate, DistanceResult, nearest};
use crate::repository::Facility;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Filtered,
    Fallback,
}

/// Which facilities the fallback ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPool {
    /// Only facilities with an emergency room
    Emergency,
    /// No facility has an emergency room (or the preference is off), so all of them
    All,
}

/// A mode-tagged result set, ready for rendering.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SearchOutcome<'a> {
    /// Facilities matching the criteria, in repository order
    Filtered { results: Vec<&'a Facility> },
    /// Nothing matched; the facilities nearest the origin, closest first
    Fallback {
        pool: FallbackPool,
        results: Vec<DistanceResult<'a>>,
    },
}

impl<'a> SearchOutcome<'a> {
    pub fn mode(&self) -> SearchMode {
        match self {
            Self::Filtered { .. } => SearchMode::Filtered,
            Self::Fallback { .. } => SearchMode::Fallback,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Filtered { results } => results.len(),
            Self::Fallback { results, .. } => results.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_fallback(&self) -> bool {
        self.mode() == SearchMode::Fallback
    }

    /// `Some` for fallback results.
    pub fn fallback_pool(&self) -> Option<FallbackPool> {
        match self {
            Self::Filtered { .. } => None,
            Self::Fallback { pool, .. } => Some(*pool),
        }
    }

    /// Result facilities in presentation order, without distances.
    pub fn facilities(&self) -> Vec<&'a Facility> {
        match self {
            Self::Filtered { results } => results.clone(),
            Self::Fallback { results, .. } => results.iter().map(|r| r.facility).collect(),
        }
    }
}

/// [`search_with_config`] with default settings and the given fallback size.
pub fn search<'a>(
    facilities: &'a [Facility],
    criteria: &FilterCriteria,
    origin: Coordinate,
    fallback_k: usize,
) -> SearchOutcome<'a> {
    let config = SearchConfig {
        fallback_k,
        ..SearchConfig::default()
    };
    search_with_config(facilities, criteria, origin, &config)
}

/// Filter `facilities`; when nothing matches, rank the fallback pool around `origin`.
///
/// The pool is the emergency-capable subset when `prefer_emergency` is on and that subset is
/// non-empty, otherwise every facility.
#[instrument(name = "Search", level = "debug", skip_all, fields(origin = %origin, fallback_k = config.fallback_k))]
pub fn search_with_config<'a>(
    facilities: &'a [Facility],
    criteria: &FilterCriteria,
    origin: Coordinate,
    config: &SearchConfig,
) -> SearchOutcome<'a> {
    let matched = apply(facilities, criteria);
    if !matched.is_empty() {
        info!(mode = "filtered", results = matched.len(), "Search complete");
        return SearchOutcome::Filtered { results: matched };
    }

    let emergency: Vec<&Facility> = if config.prefer_emergency {
        facilities.iter().filter(|f| f.has_emergency_room()).collect()
    } else {
        Vec::new()
    };
    let (pool, results) = if emergency.is_empty() {
        if config.prefer_emergency {
            warn!("No facility is marked as having an emergency room, ranking all facilities");
        }
        (FallbackPool::All, nearest(origin, facilities, config.fallback_k))
    } else {
        (
            FallbackPool::Emergency,
            nearest(origin, emergency, config.fallback_k),
        )
    };
    info!(mode = "fallback", pool = ?pool, results = results.len(), "Search complete");
    SearchOutcome::Fallback { pool, results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::EmergencyFilter;

    const ORIGIN: Coordinate = Coordinate::new(37.5665, 126.9780);

    fn facility(id: usize, lat: f64, emergency: bool, department: &str) -> Facility {
        Facility::builder(id, format!("병원{id}"), Coordinate::new(lat, 126.9780))
            .departments([department])
            .emergency(emergency)
            .build()
    }

    /// Five facilities north of the origin, two with emergency rooms.
    fn five() -> Vec<Facility> {
        vec![
            facility(0, 37.60, false, "내과"),
            facility(1, 37.70, true, "외과"),
            facility(2, 37.57, false, "내과"),
            facility(3, 37.62, true, "응급의학과"),
            facility(4, 37.58, false, "안과"),
        ]
    }

    #[test]
    fn test_filtered_keeps_input_order() {
        let all = five();
        let criteria = FilterCriteria::builder().department("내과").build();
        let outcome = search(&all, &criteria, ORIGIN, 3);

        assert_eq!(outcome.mode(), SearchMode::Filtered);
        assert_eq!(outcome.fallback_pool(), None);
        let ids: Vec<usize> = outcome.facilities().iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_fallback_prefers_emergency() {
        let all = five();
        let criteria = FilterCriteria::builder().department("피부과").build();
        let outcome = search(&all, &criteria, ORIGIN, 2);

        let SearchOutcome::Fallback { pool, results } = &outcome else {
            panic!("Expected fallback, got {outcome:?}");
        };
        assert_eq!(*pool, FallbackPool::Emergency);
        let ids: Vec<usize> = results.iter().map(|r| r.facility.id()).collect();
        assert_eq!(ids, vec![3, 1]);
        assert!(results[0].distance_km < results[1].distance_km);
    }

    #[test]
    fn test_fallback_uses_all_without_emergency_rooms() {
        let all: Vec<Facility> = five()
            .into_iter()
            .filter(|f| !f.has_emergency_room())
            .collect();
        let criteria = FilterCriteria::builder().region("없는동네").build();
        let outcome = search(&all, &criteria, ORIGIN, 3);

        assert_eq!(outcome.fallback_pool(), Some(FallbackPool::All));
        let ids: Vec<usize> = outcome.facilities().iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec![2, 4, 0]);
    }

    #[test]
    fn test_prefer_emergency_off() {
        let all = five();
        let config = SearchConfig {
            prefer_emergency: false,
            fallback_k: 1,
            ..SearchConfig::default()
        };
        let criteria = FilterCriteria::builder().keyword("없는과").build();
        let outcome = search_with_config(&all, &criteria, ORIGIN, &config);

        assert_eq!(outcome.fallback_pool(), Some(FallbackPool::All));
        assert_eq!(outcome.facilities()[0].id(), 2);
    }

    #[test]
    fn test_empty_emergency_filter_still_falls_back() {
        let all: Vec<Facility> = five()
            .into_iter()
            .filter(|f| !f.has_emergency_room())
            .collect();
        let criteria = FilterCriteria::builder()
            .emergency(EmergencyFilter::Operating)
            .build();
        let outcome = search(&all, &criteria, ORIGIN, 10);
        assert!(outcome.is_fallback());
        assert_eq!(outcome.len(), 3);
    }

    #[test]
    fn test_empty_repository() {
        let outcome = search(&[], &FilterCriteria::default(), ORIGIN, 3);
        assert!(outcome.is_fallback());
        assert!(outcome.is_empty());
    }

    #[test]
    fn test_outcome_serializes_with_mode_tag() {
        let all = five();
        let criteria = FilterCriteria::builder().department("피부과").build();
        let outcome = search(&all, &criteria, ORIGIN, 1);
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["mode"], "fallback");
        assert_eq!(json["pool"], "emergency");
        assert_eq!(json["results"][0]["facility"]["name"], "병원3");
    }
}
