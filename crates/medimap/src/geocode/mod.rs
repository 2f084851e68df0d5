//! Place-name lookup seam.
//!
//! Geocoding itself is an external service. The core only needs something that turns a query
//! into a coordinate, and treats every failure as "unknown location".

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::error::Result;
use crate::proximity::Coordinate;

/// Resolves a free-text place name to a coordinate.
pub trait Geocoder {
    /// `Ok(None)` when the service knows no such place.
    fn geocode(&self, query: &str) -> anyhow::Result<Option<Coordinate>>;
}

impl<G: Geocoder + ?Sized> Geocoder for &G {
    fn geocode(&self, query: &str) -> anyhow::Result<Option<Coordinate>> {
        (**self).geocode(query)
    }
}

/// Look `query` up, passing lookup errors to the caller.
///
/// Blank queries and out-of-range answers yield `Ok(None)`.
pub fn try_locate(geocoder: &impl Geocoder, query: &str) -> Result<Option<Coordinate>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(None);
    }
    match geocoder.geocode(query)? {
        Some(coordinate) if coordinate.is_valid() => {
            debug!(query, %coordinate, "Location resolved");
            Ok(Some(coordinate))
        }
        Some(coordinate) => {
            warn!(query, %coordinate, "Geocoder returned an invalid coordinate");
            Ok(None)
        }
        None => {
            debug!(query, "No location found");
            Ok(None)
        }
    }
}

/// [`try_locate`], logging and swallowing lookup errors.
pub fn locate(geocoder: &impl Geocoder, query: &str) -> Option<Coordinate> {
    try_locate(geocoder, query).unwrap_or_else(|e| {
        warn!(query, error = %e, "Location lookup failed");
        None
    })
}

/// [`locate`], falling back to `default` when the query is missing or cannot be resolved.
pub fn resolve_origin(
    geocoder: &impl Geocoder,
    query: Option<&str>,
    default: Coordinate,
) -> Coordinate {
    query
        .and_then(|q| locate(geocoder, q))
        .unwrap_or(default)
}

/// In-memory place table. Keys are matched trimmed and case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    places: AHashMap<String, Coordinate>,
}

fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, coordinate: Coordinate) {
        self.places.insert(normalize_key(name), coordinate);
    }

    pub fn with_place(mut self, name: &str, coordinate: Coordinate) -> Self {
        self.insert(name, coordinate);
        self
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

impl Geocoder for StaticGeocoder {
    fn geocode(&self, query: &str) -> anyhow::Result<Option<Coordinate>> {
        Ok(self.places.get(&normalize_key(query)).copied())
    }
}

impl<'s> FromIterator<(&'s str, Coordinate)> for StaticGeocoder {
    fn from_iter<T: IntoIterator<Item = (&'s str, Coordinate)>>(iter: T) -> Self {
        let mut geocoder = Self::new();
        for (name, coordinate) in iter {
            geocoder.insert(name, coordinate);
        }
        geocoder
    }
}
