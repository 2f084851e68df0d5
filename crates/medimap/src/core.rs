//! The [`HospitalFinder`] facade.
//!
//! A finder owns a shared snapshot of the facility repository and a [`SearchConfig`]. Every
//! query borrows from the snapshot; reloading swaps in a new one.
//!
//! ```rust
//! use medimap::{FilterCriteria, HospitalFinder};
//! use medimap::data_processing::{TestDataConfig, create_test_data};
//!
//! let file = create_test_data(&TestDataConfig::default())?;
//! let finder = HospitalFinder::from_csv(file.path())?;
//!
//! let criteria = FilterCriteria::builder().region("강남구").department("내과").build();
//! let outcome = finder.search(&criteria);
//! println!("{:?}: {} facilities", outcome.mode(), outcome.len());
//! # Ok::<(), medimap::error::MedimapError>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use medimap_data_processing::{DATA_FILE, RawTable, SourceMetadata};
use tracing::{info, instrument};

use crate::{
    config::{LoadConfig, SearchConfig},
    error::Result,
    filter::{FilterCriteria, apply},
    geocode::{Geocoder, resolve_origin},
    proximity::{Coordinate, DistanceResult, nearest},
    repository::{Facility, FacilityRepository, LoadReport},
    search::{SearchOutcome, search_with_config},
};

/// Hospital search over one loaded dataset.
#[derive(Debug, Clone)]
pub struct HospitalFinder {
    repository: Arc<FacilityRepository>,
    config: SearchConfig,
}

impl HospitalFinder {
    /// Load a CSV file with default settings.
    #[instrument(name = "Create HospitalFinder", level = "info", skip_all)]
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let t_init = std::time::Instant::now();
        let repository = FacilityRepository::from_csv(path, &LoadConfig::default())?;
        info!(
            facilities = repository.len(),
            elapsed = ?t_init.elapsed(),
            "HospitalFinder ready"
        );
        Ok(Self::from_repository(repository))
    }

    /// Load CSV content that did not come from a file.
    pub fn from_csv_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        let repository = FacilityRepository::from_csv_bytes(name, bytes, &LoadConfig::default())?;
        Ok(Self::from_repository(repository))
    }

    pub fn from_table(table: &RawTable, config: &LoadConfig) -> Result<Self> {
        Ok(Self::from_repository(FacilityRepository::from_table(
            table, config,
        )?))
    }

    pub fn from_repository(repository: impl Into<Arc<FacilityRepository>>) -> Self {
        Self {
            repository: repository.into(),
            config: SearchConfig::default(),
        }
    }

    pub fn builder() -> HospitalFinderBuilder {
        HospitalFinderBuilder::new()
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn repository(&self) -> &FacilityRepository {
        &self.repository
    }

    /// A shared handle to the current snapshot.
    pub fn snapshot(&self) -> Arc<FacilityRepository> {
        Arc::clone(&self.repository)
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Swap in a freshly loaded repository.
    pub fn replace_repository(&mut self, repository: impl Into<Arc<FacilityRepository>>) {
        self.repository = repository.into();
        info!(facilities = self.repository.len(), "Repository replaced");
    }

    /// Facilities matching `criteria`, without any fallback.
    #[instrument(name = "Filter", level = "debug", skip_all)]
    pub fn filter(&self, criteria: &FilterCriteria) -> Vec<&Facility> {
        apply(self.repository.iter(), criteria)
    }

    /// Search around the configured default center.
    pub fn search(&self, criteria: &FilterCriteria) -> SearchOutcome<'_> {
        self.search_from(criteria, self.config.default_center)
    }

    /// Search with an explicit origin for the fallback ranking.
    pub fn search_from(&self, criteria: &FilterCriteria, origin: Coordinate) -> SearchOutcome<'_> {
        self.search_with_config(criteria, origin, &self.config)
    }

    pub fn search_with_config(
        &self,
        criteria: &FilterCriteria,
        origin: Coordinate,
        config: &SearchConfig,
    ) -> SearchOutcome<'_> {
        let t_search = std::time::Instant::now();
        let outcome = search_with_config(self.repository.facilities(), criteria, origin, config);
        info!(
            mode = ?outcome.mode(),
            results = outcome.len(),
            elapsed = ?t_search.elapsed(),
            "Search finished"
        );
        outcome
    }

    /// Search around a place name, using the default center when it cannot be resolved.
    pub fn search_near(
        &self,
        criteria: &FilterCriteria,
        geocoder: &impl Geocoder,
        place: Option<&str>,
    ) -> SearchOutcome<'_> {
        let origin = resolve_origin(geocoder, place, self.config.default_center);
        self.search_from(criteria, origin)
    }

    /// The `k` facilities closest to `origin`, ignoring any criteria.
    pub fn nearest(&self, origin: Coordinate, k: usize) -> Vec<DistanceResult<'_>> {
        nearest(origin, self.repository.iter(), k)
    }

    /// The `k` emergency rooms closest to `origin`.
    pub fn nearest_emergency(&self, origin: Coordinate, k: usize) -> Vec<DistanceResult<'_>> {
        nearest(origin, self.repository.emergency_facilities(), k)
    }

    /// Where a map of the whole dataset should be centered.
    pub fn map_center(&self) -> Coordinate {
        self.repository
            .centroid()
            .unwrap_or(self.config.default_center)
    }

    pub fn info(&self) -> FinderInfo {
        FinderInfo {
            source: self.repository.source().cloned(),
            report: self.repository.report(),
            emergency_facilities: self.repository.emergency_facilities().count(),
            departments: self.repository.distinct_departments().len(),
        }
    }
}

/// Information about a `HospitalFinder`'s dataset.
#[derive(Debug, Clone)]
pub struct FinderInfo {
    pub source: Option<SourceMetadata>,
    pub report: LoadReport,
    pub emergency_facilities: usize,
    pub departments: usize,
}

impl FinderInfo {
    /// Get a human-readable summary of the finder.
    pub fn summary(&self) -> String {
        let source = self
            .source
            .as_ref()
            .map_or("in-memory data", |s| s.name.as_str());
        format!(
            "HospitalFinder over {source} with {} facilities ({} with emergency rooms, {} rows rejected)",
            self.report.loaded, self.emergency_facilities, self.report.rejected
        )
    }
}

/// Builder for creating `HospitalFinder` with custom configuration.
#[derive(Debug, Clone, Default)]
pub struct HospitalFinderBuilder {
    path: Option<PathBuf>,
    load_config: LoadConfig,
    search_config: SearchConfig,
}

impl HospitalFinderBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CSV file. Defaults to `MEDIMAP_DATA_FILE` or `./hospital_data.csv`.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn load_config(mut self, config: LoadConfig) -> Self {
        self.load_config = config;
        self
    }

    #[must_use]
    pub fn search_config(mut self, config: SearchConfig) -> Self {
        self.search_config = config;
        self
    }

    pub fn build(self) -> Result<HospitalFinder> {
        let path = self.path.unwrap_or_else(|| DATA_FILE.clone());
        let repository = FacilityRepository::from_csv(&path, &self.load_config)?;
        Ok(HospitalFinder::from_repository(repository).with_config(self.search_config))
    }
}
