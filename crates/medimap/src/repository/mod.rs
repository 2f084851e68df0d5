//! Normalized, immutable facility records.
//!
//! A [`FacilityRepository`] is built once from a [`RawTable`] and a detected [`FieldMap`].
//! Rows whose coordinates are missing, unparsable or out of range are dropped and counted in
//! the [`LoadReport`]; every other field falls back to a default. A reload builds a new
//! repository rather than mutating an existing one.

use std::collections::BTreeMap;
use std::path::Path;

use itertools::Itertools;
use medimap_data_processing::{LoadedSource, RawTable, SourceMetadata, load_csv, load_csv_bytes};
use serde::Serialize;
use tracing::{info, instrument, trace};

mod cache;
mod normalize;

pub use cache::{CacheStats, RepositoryCache};
pub use normalize::{
    DEFAULT_DEPARTMENT_SEPARATORS, DEFAULT_EMERGENCY_KEYWORDS, EmergencyRule, parse_weekdays,
    split_departments,
};

use crate::config::LoadConfig;
use crate::error::Result;
use crate::proximity::{Coordinate, centroid};
use crate::schema::{FieldKey, FieldMap, OperatingDay, SchemaDetector, SchemaError};

/// Name used when the source has no name for a row.
pub const NAME_PLACEHOLDER: &str = "이름 없음";
/// Phone and URL placeholder.
pub const NOT_PROVIDED: &str = "not provided";

/// One hospital or clinic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Facility {
    id: usize,
    name: String,
    address: String,
    departments: Vec<String>,
    phone: String,
    url: String,
    emergency: bool,
    location: Coordinate,
    hours: Option<String>,
    schedule: BTreeMap<OperatingDay, String>,
    #[serde(skip)]
    search_text: String,
}

/// A facility attribute looked up by [`FieldKey`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue<'a> {
    Number(f64),
    Text(&'a str),
    List(&'a [String]),
    Flag(bool),
    Schedule(&'a BTreeMap<OperatingDay, String>),
}

impl Facility {
    pub fn builder(id: usize, name: impl Into<String>, location: Coordinate) -> FacilityBuilder {
        FacilityBuilder::new(id, name, location)
    }

    /// Source row index.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn departments(&self) -> &[String] {
        &self.departments
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_emergency_room(&self) -> bool {
        self.emergency
    }

    pub fn location(&self) -> Coordinate {
        self.location
    }

    pub fn hours(&self) -> Option<&str> {
        self.hours.as_deref()
    }

    /// Day → hours text, only for days the facility is open.
    pub fn schedule(&self) -> &BTreeMap<OperatingDay, String> {
        &self.schedule
    }

    pub fn hours_on(&self, day: OperatingDay) -> Option<&str> {
        self.schedule.get(&day).map(String::as_str)
    }

    pub fn is_open_on(&self, day: OperatingDay) -> bool {
        self.hours_on(day).is_some()
    }

    /// Lowercased name and departments, the haystack for keyword search.
    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    /// Attribute lookup by canonical field.
    ///
    /// Absent optional values (`Hours`, closed days, an empty schedule) return `None`.
    pub fn field(&self, key: FieldKey) -> Option<FieldValue<'_>> {
        match key {
            FieldKey::Latitude => Some(FieldValue::Number(self.location.lat)),
            FieldKey::Longitude => Some(FieldValue::Number(self.location.lon)),
            FieldKey::Name => Some(FieldValue::Text(&self.name)),
            FieldKey::Address => Some(FieldValue::Text(&self.address)),
            FieldKey::Department => Some(FieldValue::List(&self.departments)),
            FieldKey::Phone => Some(FieldValue::Text(&self.phone)),
            FieldKey::Url => Some(FieldValue::Text(&self.url)),
            FieldKey::EmergencyFlag => Some(FieldValue::Flag(self.emergency)),
            FieldKey::Hours => self.hours().map(FieldValue::Text),
            FieldKey::Weekdays => {
                (!self.schedule.is_empty()).then_some(FieldValue::Schedule(&self.schedule))
            }
            FieldKey::OperatingDay(day) => self.hours_on(day).map(FieldValue::Text),
        }
    }
}

/// Builds a [`Facility`] outside of CSV loading, mostly for tests and callers with their own data.
#[derive(Debug, Clone)]
pub struct FacilityBuilder {
    facility: Facility,
}

impl FacilityBuilder {
    fn new(id: usize, name: impl Into<String>, location: Coordinate) -> Self {
        Self {
            facility: Facility {
                id,
                name: name.into(),
                address: String::new(),
                departments: Vec::new(),
                phone: NOT_PROVIDED.to_string(),
                url: NOT_PROVIDED.to_string(),
                emergency: false,
                location,
                hours: None,
                schedule: BTreeMap::new(),
                search_text: String::new(),
            },
        }
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.facility.address = address.into();
        self
    }

    pub fn departments<I, S>(mut self, departments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.facility.departments = departments
            .into_iter()
            .map(Into::into)
            .filter(|d: &String| !d.trim().is_empty())
            .unique()
            .collect();
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.facility.phone = phone.into();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.facility.url = url.into();
        self
    }

    pub fn emergency(mut self, emergency: bool) -> Self {
        self.facility.emergency = emergency;
        self
    }

    pub fn hours(mut self, hours: impl Into<String>) -> Self {
        self.facility.hours = Some(hours.into());
        self
    }

    /// Mark the facility open on `day`. Blank hours leave the day closed.
    pub fn open_on(mut self, day: OperatingDay, hours: impl Into<String>) -> Self {
        let hours = hours.into();
        if hours.trim().is_empty() {
            self.facility.schedule.remove(&day);
        } else {
            self.facility.schedule.insert(day, hours);
        }
        self
    }

    pub fn build(mut self) -> Facility {
        let f = &mut self.facility;
        f.search_text = std::iter::once(f.name.as_str())
            .chain(f.departments.iter().map(String::as_str))
            .join(" ")
            .to_lowercase();
        self.facility
    }
}

/// Row counts from one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded: usize,
    pub rejected: usize,
}

/// The in-memory facility set plus how it was read.
#[derive(Debug, Clone, Default)]
pub struct FacilityRepository {
    facilities: Vec<Facility>,
    field_map: FieldMap,
    report: LoadReport,
    source: Option<SourceMetadata>,
}

impl FacilityRepository {
    /// Build facilities from `table` using an already detected `field_map`.
    ///
    /// Fails only if `field_map` lacks a required field; bad rows are dropped, not reported as
    /// errors.
    #[instrument(name = "Load facilities", level = "info", skip_all, fields(rows = table.height()))]
    pub fn load(table: &RawTable, field_map: &FieldMap, config: &LoadConfig) -> Result<Self> {
        let missing = field_map.missing_required();
        if !missing.is_empty() {
            return Err(SchemaError::Incomplete { missing }.into());
        }
        let t_load = std::time::Instant::now();
        let cell = |row: usize, key: FieldKey| {
            field_map
                .index(key)
                .and_then(|column| table.cell(row, column))
        };
        let days: Vec<(OperatingDay, usize)> = OperatingDay::ALL
            .into_iter()
            .filter_map(|day| Some((day, field_map.index(FieldKey::OperatingDay(day))?)))
            .collect();

        let mut facilities = Vec::with_capacity(table.height());
        for row in 0..table.height() {
            let lat = cell(row, FieldKey::Latitude);
            let lon = cell(row, FieldKey::Longitude);
            let Some(location) = normalize::parse_coordinate(lat, lon) else {
                trace!(row, ?lat, ?lon, "Rejected row without usable coordinates");
                continue;
            };

            let text = |key| normalize::clean(cell(row, key));
            let not_provided = config.not_provided.as_str();
            let mut builder = Facility::builder(
                row,
                text(FieldKey::Name).unwrap_or(config.name_placeholder.as_str()),
                location,
            )
            .address(text(FieldKey::Address).unwrap_or_default())
            .departments(
                cell(row, FieldKey::Department)
                    .map(|d| split_departments(d, &config.department_separators))
                    .unwrap_or_default(),
            )
            .phone(text(FieldKey::Phone).unwrap_or(not_provided))
            .url(text(FieldKey::Url).unwrap_or(not_provided))
            .emergency(config.emergency.is_truthy(cell(row, FieldKey::EmergencyFlag)));
            if let Some(hours) = text(FieldKey::Hours) {
                builder = builder.hours(hours);
            }
            let mut schedule: BTreeMap<OperatingDay, &str> = days
                .iter()
                .filter_map(|&(day, column)| Some((day, normalize::clean(table.cell(row, column))?)))
                .collect();
            if let Some(listed) = text(FieldKey::Weekdays) {
                // Filled per-day cells win over the weekday list
                let hours = text(FieldKey::Hours).unwrap_or(listed);
                for day in parse_weekdays(listed, &config.department_separators) {
                    schedule.entry(day).or_insert(hours);
                }
            }
            for (day, hours) in schedule {
                builder = builder.open_on(day, hours);
            }
            facilities.push(builder.build());
        }

        let report = LoadReport {
            total_rows: table.height(),
            loaded: facilities.len(),
            rejected: table.height() - facilities.len(),
        };
        info!(
            loaded = report.loaded,
            rejected = report.rejected,
            emergency = facilities.iter().filter(|f| f.has_emergency_room()).count(),
            elapsed = ?t_load.elapsed(),
            "Facilities loaded"
        );
        Ok(Self {
            facilities,
            field_map: field_map.clone(),
            report,
            source: None,
        })
    }

    /// Detect the schema of `table` and load it.
    pub fn from_table(table: &RawTable, config: &LoadConfig) -> Result<Self> {
        let field_map = SchemaDetector::new(config.aliases.clone()).detect(table.headers())?;
        Self::load(table, &field_map, config)
    }

    pub fn from_source(source: LoadedSource, config: &LoadConfig) -> Result<Self> {
        let mut repository = Self::from_table(&source.table, config)?;
        repository.source = Some(source.metadata);
        Ok(repository)
    }

    pub fn from_csv(path: impl AsRef<Path>, config: &LoadConfig) -> Result<Self> {
        Self::from_source(load_csv(path)?, config)
    }

    pub fn from_csv_bytes(name: &str, bytes: &[u8], config: &LoadConfig) -> Result<Self> {
        Self::from_source(load_csv_bytes(name, bytes)?, config)
    }

    /// Wrap already built facilities. They are kept in id order.
    pub fn from_facilities(mut facilities: Vec<Facility>) -> Self {
        facilities.sort_by_key(Facility::id);
        let count = facilities.len();
        Self {
            facilities,
            field_map: FieldMap::default(),
            report: LoadReport {
                total_rows: count,
                loaded: count,
                rejected: 0,
            },
            source: None,
        }
    }

    pub fn facilities(&self) -> &[Facility] {
        &self.facilities
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Facility> {
        self.facilities.iter()
    }

    pub fn len(&self) -> usize {
        self.facilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facilities.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Facility> {
        self.facilities
            .binary_search_by_key(&id, Facility::id)
            .ok()
            .map(|index| &self.facilities[index])
    }

    pub fn field_value(&self, id: usize, key: FieldKey) -> Option<FieldValue<'_>> {
        self.get(id)?.field(key)
    }

    /// Facilities whose emergency flag is set, in repository order.
    pub fn emergency_facilities(&self) -> impl Iterator<Item = &Facility> {
        self.facilities.iter().filter(|f| f.has_emergency_room())
    }

    /// Sorted, de-duplicated departments across all facilities.
    pub fn distinct_departments(&self) -> Vec<&str> {
        self.facilities
            .iter()
            .flat_map(|f| f.departments().iter().map(String::as_str))
            .sorted_unstable()
            .dedup()
            .collect()
    }

    /// Mean position of every facility, used to center a map.
    pub fn centroid(&self) -> Option<Coordinate> {
        centroid(&self.facilities)
    }

    pub fn field_map(&self) -> &FieldMap {
        &self.field_map
    }

    pub fn report(&self) -> LoadReport {
        self.report
    }

    pub fn source(&self) -> Option<&SourceMetadata> {
        self.source.as_ref()
    }
}

impl<'a> IntoIterator for &'a FacilityRepository {
    type Item = &'a Facility;
    type IntoIter = std::slice::Iter<'a, Facility>;

    fn into_iter(self) -> Self::IntoIter {
        self.facilities.iter()
    }
}
