//! Great-circle distance ranking.
//!
//! Distances use the haversine formula on a spherical earth of radius [`EARTH_RADIUS_KM`].
//! Rankings are produced by a full scan followed by a stable sort, so facilities at equal
//! distance keep their input order.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::repository::Facility;

/// Mean earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// `None` unless both values are finite and inside |lat| ≤ 90, |lon| ≤ 180.
    pub fn checked(lat: f64, lon: f64) -> Option<Self> {
        let coordinate = Self::new(lat, lon);
        coordinate.is_valid().then_some(coordinate)
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && self.lat.abs() <= 90.0
            && self.lon.abs() <= 180.0
    }

    /// Haversine distance to `other` in kilometres.
    pub fn distance_km(&self, other: &Self) -> f64 {
        haversine_km(*self, *other)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1 for antipodal points
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// A facility paired with its distance from the query origin.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DistanceResult<'a> {
    pub facility: &'a Facility,
    pub distance_km: f64,
}

/// Every candidate with its distance from `origin`, nearest first.
pub fn rank_all<'a, I>(origin: Coordinate, candidates: I) -> Vec<DistanceResult<'a>>
where
    I: IntoIterator<Item = &'a Facility>,
{
    let mut ranked: Vec<DistanceResult<'a>> = candidates
        .into_iter()
        .map(|facility| DistanceResult {
            facility,
            distance_km: haversine_km(origin, facility.location()),
        })
        .collect();
    // `sort_by` is stable: equal distances stay in input order
    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    ranked
}

/// The `k` candidates closest to `origin`, nearest first.
///
/// Returns `min(k, candidates)` results; `k == 0` yields an empty list.
#[instrument(name = "Nearest facilities", level = "debug", skip(candidates), fields(origin = %origin))]
pub fn nearest<'a, I>(origin: Coordinate, candidates: I, k: usize) -> Vec<DistanceResult<'a>>
where
    I: IntoIterator<Item = &'a Facility>,
{
    if k == 0 {
        return Vec::new();
    }
    let mut ranked = rank_all(origin, candidates);
    ranked.truncate(k);
    debug!(
        returned = ranked.len(),
        farthest_km = ranked.last().map(|r| r.distance_km),
        "Ranked nearest facilities"
    );
    ranked
}

/// Mean position of the given facilities, `None` for an empty set.
pub fn centroid<'a, I>(facilities: I) -> Option<Coordinate>
where
    I: IntoIterator<Item = &'a Facility>,
{
    let (count, lat, lon) = facilities
        .into_iter()
        .fold((0usize, 0.0, 0.0), |(n, lat, lon), facility| {
            let location = facility.location();
            (n + 1, lat + location.lat, lon + location.lon)
        });
    (count > 0).then(|| Coordinate::new(lat / count as f64, lon / count as f64))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn facility(id: usize, lat: f64, lon: f64) -> Facility {
        Facility::builder(id, format!("병원 {id}"), Coordinate::new(lat, lon)).build()
    }

    const SEOUL_CITY_HALL: Coordinate = Coordinate::new(37.5665, 126.9780);
    const BUSAN_STATION: Coordinate = Coordinate::new(35.1152, 129.0422);

    #[test]
    fn test_known_distance() {
        // Seoul City Hall to Busan Station is roughly 330 km as the crow flies
        let d = haversine_km(SEOUL_CITY_HALL, BUSAN_STATION);
        assert!((d - 330.0).abs() < 10.0, "Unexpected distance {d}");
    }

    #[test]
    fn test_zero_distance_and_symmetry() {
        assert_eq!(haversine_km(SEOUL_CITY_HALL, SEOUL_CITY_HALL), 0.0);
        let there = haversine_km(SEOUL_CITY_HALL, BUSAN_STATION);
        let back = haversine_km(BUSAN_STATION, SEOUL_CITY_HALL);
        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn test_antipodal_points_do_not_produce_nan() {
        let d = haversine_km(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 180.0));
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn test_checked_rejects_out_of_range() {
        assert!(Coordinate::checked(37.5, 127.0).is_some());
        assert!(Coordinate::checked(90.0, -180.0).is_some());
        assert!(Coordinate::checked(123.0, 127.0).is_none());
        assert!(Coordinate::checked(37.5, 181.0).is_none());
        assert!(Coordinate::checked(f64::NAN, 127.0).is_none());
        assert!(Coordinate::checked(37.5, f64::INFINITY).is_none());
    }

    #[test]
    fn test_nearest_orders_and_truncates() {
        let facilities = vec![
            facility(0, 37.60, 126.98),
            facility(1, 37.5666, 126.9781),
            facility(2, 37.50, 127.00),
            facility(3, 35.10, 129.04),
        ];

        let ranked = nearest(SEOUL_CITY_HALL, &facilities, 2);
        let ids: Vec<usize> = ranked.iter().map(|r| r.facility.id()).collect();
        assert_eq!(ids, vec![1, 0]);

        assert_eq!(nearest(SEOUL_CITY_HALL, &facilities, 10).len(), 4);
        assert!(nearest(SEOUL_CITY_HALL, &facilities, 0).is_empty());
        assert!(nearest(SEOUL_CITY_HALL, std::iter::empty::<&Facility>(), 3).is_empty());
    }

    #[test]
    fn test_ties_keep_input_order() {
        let facilities = vec![
            facility(7, 37.57, 126.98),
            facility(3, 37.57, 126.98),
            facility(5, 37.57, 126.98),
        ];
        let ranked = nearest(SEOUL_CITY_HALL, &facilities, 3);
        let ids: Vec<usize> = ranked.iter().map(|r| r.facility.id()).collect();
        assert_eq!(ids, vec![7, 3, 5]);
    }

    #[test]
    fn test_centroid() {
        let facilities = vec![facility(0, 37.0, 127.0), facility(1, 38.0, 126.0)];
        let center = centroid(&facilities).unwrap();
        assert!((center.lat - 37.5).abs() < 1e-12);
        assert!((center.lon - 126.5).abs() < 1e-12);
        assert!(centroid(std::iter::empty::<&Facility>()).is_none());
    }

    fn coordinate() -> impl Strategy<Value = Coordinate> {
        (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lon)| Coordinate::new(lat, lon))
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric_and_bounded(a in coordinate(), b in coordinate()) {
            let ab = haversine_km(a, b);
            let ba = haversine_km(b, a);
            prop_assert!((ab - ba).abs() < 1e-6);
            prop_assert!(ab >= 0.0);
            prop_assert!(ab <= std::f64::consts::PI * EARTH_RADIUS_KM + 1e-6);
            prop_assert_eq!(haversine_km(a, a), 0.0);
        }

        #[test]
        fn prop_nearest_is_sorted_with_expected_length(
            origin in coordinate(),
            points in prop::collection::vec(coordinate(), 0..40),
            k in 0usize..50,
        ) {
            let facilities: Vec<Facility> = points
                .iter()
                .enumerate()
                .map(|(id, c)| facility(id, c.lat, c.lon))
                .collect();
            let ranked = nearest(origin, &facilities, k);

            prop_assert_eq!(ranked.len(), k.min(facilities.len()));
            prop_assert!(ranked.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
        }
    }
}
