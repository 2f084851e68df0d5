use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    error::{MedimapError, Result},
    proximity::Coordinate,
    repository::{
        DEFAULT_DEPARTMENT_SEPARATORS, DEFAULT_EMERGENCY_KEYWORDS, EmergencyRule,
        NAME_PLACEHOLDER, NOT_PROVIDED,
    },
    schema::{AliasTable, ColumnCandidates, FieldKey},
};

/// Seoul City Hall, the map center used when nothing better is known.
pub const SEOUL_CITY_HALL: Coordinate = Coordinate::new(37.5665, 126.9780);

/// Number of facilities recommended when a query matches nothing.
pub const DEFAULT_FALLBACK_K: usize = 3;

/// Controls how searches fall back and where they are centered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Facilities returned by the nearest-facility fallback
    pub fallback_k: usize,
    /// Restrict the fallback to emergency rooms when any exist
    pub prefer_emergency: bool,
    /// Origin used when no location is given or geocoding fails
    pub default_center: Coordinate,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fallback_k: DEFAULT_FALLBACK_K,
            prefer_emergency: true,
            default_center: SEOUL_CITY_HALL,
        }
    }
}

/// Builder for creating search configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Create a new builder with sensible defaults
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    /// Create a builder for "take me to the closest ER" lookups
    pub fn nearest_emergency() -> Self {
        let mut builder = Self::new();
        builder.config.fallback_k = 1;
        builder.config.prefer_emergency = true;
        builder
    }

    /// Create a builder that recommends more facilities and does not favour emergency rooms
    pub fn broad() -> Self {
        let mut builder = Self::new();
        builder.config.fallback_k = 10;
        builder.config.prefer_emergency = false;
        builder
    }

    /// Set how many facilities the fallback recommends
    pub fn fallback_k(mut self, k: usize) -> Self {
        self.config.fallback_k = k;
        self
    }

    /// Enable or disable the emergency-first fallback pool
    pub fn prefer_emergency(mut self, enabled: bool) -> Self {
        self.config.prefer_emergency = enabled;
        self
    }

    /// Set the default map center
    pub fn default_center(mut self, lat: f64, lon: f64) -> Result<Self> {
        let center = Coordinate::checked(lat, lon).ok_or_else(|| {
            MedimapError::ConfigError(format!(
                "Default center must be a valid coordinate, got ({lat}, {lon})"
            ))
        })?;
        self.config.default_center = center;
        Ok(self)
    }

    /// Build the final configuration
    pub fn build(self) -> SearchConfig {
        self.config
    }
}

/// How raw rows become facilities.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub aliases: AliasTable,
    pub department_separators: Vec<char>,
    pub emergency: EmergencyRule,
    pub name_placeholder: String,
    pub not_provided: String,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            aliases: AliasTable::default(),
            department_separators: DEFAULT_DEPARTMENT_SEPARATORS.to_vec(),
            emergency: EmergencyRule::default(),
            name_placeholder: NAME_PLACEHOLDER.to_string(),
            not_provided: NOT_PROVIDED.to_string(),
        }
    }
}

impl LoadConfig {
    pub fn builder() -> LoadConfigBuilder {
        LoadConfigBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadConfigBuilder {
    config: LoadConfig,
}

impl LoadConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole alias table
    pub fn aliases(mut self, aliases: AliasTable) -> Self {
        self.config.aliases = aliases;
        self
    }

    /// Override the aliases of a single field
    pub fn alias(mut self, key: FieldKey, candidates: ColumnCandidates) -> Self {
        self.config.aliases.set(key, candidates);
        self
    }

    /// Overlay a JSON alias file on the current table
    pub fn aliases_from_json_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let overrides = AliasTable::from_json_file(path)?;
        self.config.aliases = self.config.aliases.merge(overrides);
        Ok(self)
    }

    pub fn department_separators(mut self, separators: impl IntoIterator<Item = char>) -> Self {
        self.config.department_separators = separators.into_iter().collect();
        self
    }

    /// Replace the keywords that mark a cell as "has an emergency room"
    pub fn emergency_keywords<I, S>(mut self, keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.emergency = EmergencyRule::new(keywords)?;
        Ok(self)
    }

    pub fn name_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.config.name_placeholder = placeholder.into();
        self
    }

    pub fn not_provided(mut self, placeholder: impl Into<String>) -> Self {
        self.config.not_provided = placeholder.into();
        self
    }

    pub fn build(self) -> LoadConfig {
        self.config
    }
}
