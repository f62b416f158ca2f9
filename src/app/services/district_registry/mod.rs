//! District registry: the immutable set of administrative regions of a state
//!
//! The registry is loaded once per state from a [`BoundarySource`] and shared
//! read-only (behind an `Arc`) by every raster worker of the run. District
//! names are canonicalized on load, so lookups and zonal observations always
//! carry the canonical key.

use crate::app::services::canonicalizer::DistrictCanonicalizer;
use crate::{Error, Result};
use geo::{BoundingRect, MultiPolygon, Rect};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub mod loader;

#[cfg(test)]
pub mod tests;

pub use loader::GeoJsonBoundarySource;

/// One district polygon belonging to a state
#[derive(Debug, Clone, PartialEq)]
pub struct AdministrativeRegion {
    /// Canonical district key
    pub district: String,

    /// Spelling as found in the boundary file
    pub display_name: String,

    /// Owning state name
    pub state: String,

    pub geometry: MultiPolygon<f64>,

    bounds: Option<Rect<f64>>,
}

impl AdministrativeRegion {
    pub fn new(
        district: impl Into<String>,
        display_name: impl Into<String>,
        state: impl Into<String>,
        geometry: MultiPolygon<f64>,
    ) -> Self {
        let bounds = geometry.bounding_rect();
        Self {
            district: district.into(),
            display_name: display_name.into(),
            state: state.into(),
            geometry,
            bounds,
        }
    }

    /// Bounding rectangle of the geometry; `None` for an empty geometry
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.bounds
    }
}

/// A raw feature read from a boundary file, before canonicalization
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryFeature {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

/// Statistics about reading a boundary source
#[derive(Debug, Clone, Default)]
pub struct LoadStats {
    /// Features present in the source
    pub features_read: usize,

    /// Features dropped by the state filter
    pub features_filtered: usize,

    /// Features skipped for a missing name or non-polygon geometry
    pub features_skipped: usize,

    /// Distinct canonical districts loaded
    pub districts_loaded: usize,

    pub load_duration: Duration,
}

/// Anything that can provide the district polygons of one state
pub trait BoundarySource {
    /// Human-readable origin, used in logs and errors
    fn describe(&self) -> String;

    /// Read every feature that belongs to the state
    fn read_features(&self, stats: &mut LoadStats) -> Result<Vec<BoundaryFeature>>;
}

/// Immutable lookup of a state's administrative regions by canonical name
#[derive(Debug, Clone)]
pub struct DistrictRegistry {
    state: String,
    regions: Vec<AdministrativeRegion>,
    index: BTreeMap<String, usize>,
}

impl DistrictRegistry {
    /// Build a registry from already canonical regions
    ///
    /// Fails when there are no regions or when two regions share a key.
    pub fn from_regions(
        state: impl Into<String>,
        regions: Vec<AdministrativeRegion>,
    ) -> Result<Self> {
        let state = state.into();
        if regions.is_empty() {
            return Err(Error::boundary(format!(
                "No districts loaded for state '{}'",
                state
            )));
        }

        let mut index = BTreeMap::new();
        for (position, region) in regions.iter().enumerate() {
            if index.insert(region.district.clone(), position).is_some() {
                return Err(Error::canonicalization(format!(
                    "District '{}' appears more than once in state '{}'",
                    region.district, state
                )));
            }
        }

        Ok(Self {
            state,
            regions,
            index,
        })
    }

    /// Load and canonicalize the regions of a state
    ///
    /// Features sharing a canonical key (multi-part districts, or an old
    /// spelling next to its renamed form) are merged into one region. Two
    /// spellings collapsing onto one key without a rename fail the load, as
    /// does an empty result.
    pub fn load(
        source: &dyn BoundarySource,
        state: &str,
        canonicalizer: &DistrictCanonicalizer,
    ) -> Result<(Self, LoadStats)> {
        let start = Instant::now();
        let mut stats = LoadStats::default();
        info!("Loading district boundaries for {} from {}", state, source.describe());

        let features = source.read_features(&mut stats)?;

        let collisions = canonicalizer.detect_collisions(features.iter().map(|f| f.name.as_str()));
        if let Some(collision) = collisions.first() {
            return Err(Error::canonicalization(format!(
                "Boundary spellings {:?} in {} all map to district '{}'",
                collision.spellings,
                source.describe(),
                collision.canonical
            )));
        }

        let mut merged: BTreeMap<String, AdministrativeRegion> = BTreeMap::new();
        for feature in features {
            let district = canonicalizer.canonicalize(&feature.name);
            match merged.get_mut(&district) {
                Some(existing) => {
                    debug!("Merging additional polygon for district '{}'", district);
                    let mut polygons = existing.geometry.0.clone();
                    polygons.extend(feature.geometry.0);
                    *existing = AdministrativeRegion::new(
                        district.clone(),
                        existing.display_name.clone(),
                        state,
                        MultiPolygon::new(polygons),
                    );
                }
                None => {
                    let display_name = feature.name.trim().to_string();
                    merged.insert(
                        district.clone(),
                        AdministrativeRegion::new(district, display_name, state, feature.geometry),
                    );
                }
            }
        }

        let registry = Self::from_regions(state, merged.into_values().collect())
            .map_err(|e| match e {
                Error::Boundary { message } => {
                    Error::boundary(format!("{} ({})", message, source.describe()))
                }
                other => other,
            })?;

        stats.districts_loaded = registry.len();
        stats.load_duration = start.elapsed();
        info!(
            "Loaded {} districts for {} ({} features read, {} filtered, {} skipped)",
            stats.districts_loaded,
            state,
            stats.features_read,
            stats.features_filtered,
            stats.features_skipped
        );

        Ok((registry, stats))
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// Regions in canonical-name order
    pub fn regions(&self) -> &[AdministrativeRegion] {
        &self.regions
    }

    pub fn get(&self, district: &str) -> Option<&AdministrativeRegion> {
        self.index.get(district).map(|&position| &self.regions[position])
    }

    pub fn contains(&self, district: &str) -> bool {
        self.index.contains_key(district)
    }

    /// Canonical district keys in sorted order
    pub fn districts(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
