//! Memoized repository loading keyed by source checksum.

use std::path::Path;
use std::sync::Arc;

use medimap_data_processing::{DataError, SourceId, load_csv_bytes};
use tracing::{debug, info, instrument};

use super::FacilityRepository;
use crate::config::LoadConfig;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

#[derive(Debug)]
struct CacheEntry {
    id: SourceId,
    repository: Arc<FacilityRepository>,
}

/// Holds the most recently loaded repository and reuses it while the source bytes are unchanged.
///
/// Callers receive `Arc` snapshots: a reload swaps the whole facility set and snapshots already
/// handed out stay valid.
#[derive(Debug, Default)]
pub struct RepositoryCache {
    config: LoadConfig,
    entry: Option<CacheEntry>,
    stats: CacheStats,
}

impl RepositoryCache {
    pub fn new(config: LoadConfig) -> Self {
        Self {
            config,
            entry: None,
            stats: CacheStats::default(),
        }
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Load `path`, or return the cached repository if the file content has not changed.
    #[instrument(name = "Cached load", level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<Arc<FacilityRepository>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::SourceNotFound(path.display().to_string()).into());
        }
        let bytes = std::fs::read(path)?;
        self.load_bytes(&path.display().to_string(), &bytes)
    }

    /// Load CSV content, or return the cached repository if it has the same checksum.
    pub fn load_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<Arc<FacilityRepository>> {
        let id = SourceId::of_bytes(bytes);
        if let Some(entry) = self.entry.as_ref().filter(|entry| entry.id == id) {
            self.stats.hits += 1;
            debug!(checksum = %id, "Repository cache hit");
            return Ok(Arc::clone(&entry.repository));
        }

        self.stats.misses += 1;
        let source = load_csv_bytes(name, bytes)?;
        let repository = Arc::new(FacilityRepository::from_source(source, &self.config)?);
        info!(checksum = %id, facilities = repository.len(), "Repository cache refreshed");
        self.entry = Some(CacheEntry {
            id,
            repository: Arc::clone(&repository),
        });
        Ok(repository)
    }

    /// Whether the cached snapshot was built from the current content of `path`.
    pub fn is_fresh(&self, path: impl AsRef<Path>) -> Result<bool> {
        let Some(entry) = &self.entry else {
            return Ok(false);
        };
        Ok(SourceId::of_path(path.as_ref())? == entry.id)
    }

    pub fn cached(&self) -> Option<Arc<FacilityRepository>> {
        self.entry.as_ref().map(|entry| Arc::clone(&entry.repository))
    }

    /// Drop the cached snapshot so the next load re-reads the source.
    pub fn invalidate(&mut self) {
        if self.entry.take().is_some() {
            debug!("Repository cache invalidated");
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use medimap_data_processing::test_data::test_data_csv;
    use medimap_data_processing::{TestDataConfig, create_test_data};

    use super::*;

    #[test]
    fn test_unchanged_source_is_served_from_cache() {
        let file = create_test_data(&TestDataConfig::minimal()).unwrap();
        let mut cache = RepositoryCache::default();

        let first = cache.load_path(file.path()).unwrap();
        let second = cache.load_path(file.path()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
        assert!(cache.is_fresh(file.path()).unwrap());
    }

    #[test]
    fn test_changed_content_reloads() {
        let mut file = create_test_data(&TestDataConfig::minimal()).unwrap();
        let mut cache = RepositoryCache::default();
        let before = cache.load_path(file.path()).unwrap();
        assert_eq!(before.len(), 3);

        file.write_all("추가의원,서울특별시,내과,,,N,37.55,126.99,,,,,,,,\n".as_bytes())
            .unwrap();
        file.flush().unwrap();
        assert!(!cache.is_fresh(file.path()).unwrap());

        let after = cache.load_path(file.path()).unwrap();
        assert_eq!(after.len(), 4);
        assert_eq!(before.len(), 3, "Old snapshot must stay intact");
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let csv = test_data_csv(&TestDataConfig::minimal()).unwrap();
        let mut cache = RepositoryCache::default();

        let first = cache.load_bytes("upload", csv.as_bytes()).unwrap();
        cache.invalidate();
        assert!(cache.cached().is_none());

        let second = cache.load_bytes("upload", csv.as_bytes()).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.facilities(), second.facilities());
        assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 2 });
    }

    #[test]
    fn test_missing_file() {
        let mut cache = RepositoryCache::default();
        let result = cache.load_path("/definitely/not/here.csv");
        assert!(result.is_err());
        assert!(cache.cached().is_none());
    }
}
