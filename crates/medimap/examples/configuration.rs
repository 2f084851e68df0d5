//! Configuring loading and searching
//!
//! This example shows:
//! - Search presets and custom fallback settings
//! - Overriding header aliases and emergency keywords
//! - Searching around a geocoded place
//! - Reusing a cached repository

use medimap::data_processing::{TestDataConfig, create_test_data};
use medimap::{
    ColumnCandidates, Coordinate, FieldKey, FilterCriteria, HospitalFinder, LoadConfig,
    RepositoryCache, SearchConfigBuilder, StaticGeocoder,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    medimap::init_logging(tracing::Level::WARN)?;
    let fixture = create_test_data(&TestDataConfig::sample())?;

    // Loading: extra header spellings and a stricter emergency keyword list
    let load_config = LoadConfig::builder()
        .alias(
            FieldKey::Name,
            ColumnCandidates::new(["병원명", "요양기관명", "name"]),
        )
        .emergency_keywords(["응급", "emergency", "권역센터"])?
        .build();

    let mut cache = RepositoryCache::new(load_config);
    let repository = cache.load_path(fixture.path())?;
    println!(
        "Loaded {} facilities ({} rejected)",
        repository.len(),
        repository.report().rejected
    );

    // Searching: one nearest ER, centered on Busan if nothing else is known
    let search_config = SearchConfigBuilder::nearest_emergency()
        .default_center(35.1796, 129.0756)?
        .build();
    let finder = HospitalFinder::from_repository(repository).with_config(search_config);

    let geocoder = StaticGeocoder::new()
        .with_place("잠실역", Coordinate::new(37.5133, 127.1001))
        .with_place("신촌역", Coordinate::new(37.5552, 126.9368));

    let criteria = FilterCriteria::builder().department("흉부외과").build();
    for place in ["잠실역", "신촌역", "어딘가"] {
        let outcome = finder.search_near(&criteria, &geocoder, Some(place));
        if let Some(facility) = outcome.facilities().first() {
            println!("Nearest ER to {place}: {}", facility.name());
        }
    }

    // A second load of the unchanged file is served from the cache
    let again = cache.load_path(fixture.path())?;
    println!(
        "Cache: {:?}, same snapshot: {}",
        cache.stats(),
        std::sync::Arc::ptr_eq(&again, &finder.snapshot())
    );

    Ok(())
}
