//! Medimap - Hospital Search Core
//!
//! Medimap finds hospitals and clinics in a CSV dataset by region, keyword, medical department,
//! opening day and emergency-room availability. When nothing matches it recommends the nearest
//! facilities instead, preferring those with an emergency room.
//!
//! # Quick Start
//!
//! ```rust
//! use medimap::data_processing::{TestDataConfig, create_test_data};
//! use medimap::{FilterCriteria, HospitalFinder, KeywordMode, SearchOutcome};
//!
//! let file = create_test_data(&TestDataConfig::default())?;
//! let finder = HospitalFinder::from_csv(file.path())?;
//!
//! // "강남 내과": both words must appear in the name or departments
//! let criteria = FilterCriteria::builder()
//!     .keyword_query("강남 내과")
//!     .keyword_mode(KeywordMode::And)
//!     .build();
//!
//! match finder.search(&criteria) {
//!     SearchOutcome::Filtered { results } => {
//!         for facility in results {
//!             println!("{} ({})", facility.name(), facility.address());
//!         }
//!     }
//!     SearchOutcome::Fallback { pool, results } => {
//!         println!("No match, nearest {pool:?} facilities:");
//!         for r in results {
//!             println!("{} {:.1} km", r.facility.name(), r.distance_km);
//!         }
//!     }
//! }
//! # Ok::<(), medimap::error::MedimapError>(())
//! ```
//!
//! # Features
//!
//! - **Schema detection**: Korean and English header conventions via a JSON-configurable alias table
//! - **Filtering**: region, keywords (AND/OR), departments, opening day, hours text, emergency room
//! - **Fallback ranking**: haversine distance, emergency rooms first
//! - **Cached loading**: repositories are reused while the source checksum is unchanged
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod config;
mod core;
pub mod error;
mod filter;
mod geocode;
mod proximity;
mod repository;
mod schema;
mod search;

pub use crate::core::{FinderInfo, HospitalFinder, HospitalFinderBuilder};

pub use config::{
    DEFAULT_FALLBACK_K, LoadConfig, LoadConfigBuilder, SEOUL_CITY_HALL, SearchConfig,
    SearchConfigBuilder,
};
pub use filter::{EmergencyFilter, FilterCriteria, FilterCriteriaBuilder, KeywordMode, apply};
pub use geocode::{Geocoder, StaticGeocoder, locate, resolve_origin, try_locate};
pub use medimap_data_processing as data_processing;
pub use polars;
pub use proximity::{
    Coordinate, DistanceResult, EARTH_RADIUS_KM, centroid, haversine_km, nearest, rank_all,
};
pub use repository::{
    CacheStats, EmergencyRule, Facility, FacilityBuilder, FacilityRepository, FieldValue,
    LoadReport, NAME_PLACEHOLDER, NOT_PROVIDED, RepositoryCache, parse_weekdays,
};
pub use schema::{
    AliasTable, ColumnCandidates, ColumnRef, FieldKey, FieldMap, OperatingDay, SchemaDetector,
    SchemaError,
};
pub use search::{FallbackPool, SearchMode, SearchOutcome, search, search_with_config};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the Medimap library.
///
/// `RUST_LOG` takes precedence over `level` when set. Polars output is capped at `warn`.
/// Later calls are no-ops.
///
/// ```rust
/// use medimap::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), medimap::error::MedimapError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::MedimapError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("polars=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .map_err(|e| error::MedimapError::InitLoggingSubscriber(e.to_string()))?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_processing::{HeaderStyle, TestDataConfig, create_test_data};

    fn setup_test_env() {
        let _ = init_logging(tracing::Level::WARN);
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        setup_test_env();
        assert!(init_logging(tracing::Level::DEBUG).is_ok());
    }

    #[test]
    fn test_finder_creation() {
        setup_test_env();

        let file = create_test_data(&TestDataConfig::minimal()).unwrap();
        let finder = HospitalFinder::from_csv(file.path());
        assert!(finder.is_ok(), "Should be able to create finder with test data");
        assert_eq!(finder.unwrap().repository().len(), 3);
    }

    #[test]
    fn test_keyword_search() {
        setup_test_env();

        let file = create_test_data(&TestDataConfig::default()).unwrap();
        let finder = HospitalFinder::from_csv(file.path()).unwrap();
        let criteria = FilterCriteria::builder().keyword_query("강남 내과").build();

        let outcome = finder.search(&criteria);
        assert_eq!(outcome.mode(), SearchMode::Filtered);
        let names: Vec<&str> = outcome.facilities().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["강남연세내과의원", "강남세브란스병원"]);
    }

    #[test]
    fn test_english_headers() {
        setup_test_env();

        let config = TestDataConfig::default().with_header_style(HeaderStyle::English);
        let file = create_test_data(&config).unwrap();
        let finder = HospitalFinder::from_csv(file.path()).unwrap();

        let field_map = finder.repository().field_map();
        assert_eq!(field_map.column_name(FieldKey::Latitude), Some("lat"));
        assert_eq!(
            field_map.column_name(FieldKey::OperatingDay(OperatingDay::Holiday)),
            Some("holiday")
        );
        assert_eq!(finder.repository().len(), 12);
    }
}
