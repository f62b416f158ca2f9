//! GeoJSON boundary loading
//!
//! Reads a district FeatureCollection, keeps the features of one state and
//! converts their geometries into `geo` multipolygons.

use super::{BoundaryFeature, BoundarySource, LoadStats};
use crate::config::BoundarySchema;
use crate::{Error, Result};
use geo::{Geometry, MultiPolygon};
use geojson::{Feature, FeatureCollection, GeoJson};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Boundary source backed by a GeoJSON FeatureCollection on disk
#[derive(Debug, Clone)]
pub struct GeoJsonBoundarySource {
    path: PathBuf,
    schema: BoundarySchema,
}

impl GeoJsonBoundarySource {
    pub fn new(path: impl Into<PathBuf>, schema: BoundarySchema) -> Self {
        Self {
            path: path.into(),
            schema,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn label(&self) -> String {
        self.path.display().to_string()
    }

    /// Whether the feature passes the configured state filter
    fn in_state(&self, feature: &Feature) -> bool {
        let (Some(field), Some(filter)) = (&self.schema.state_field, &self.schema.state_filter)
        else {
            return true;
        };
        feature
            .property(field)
            .and_then(|value| value.as_str())
            .map(|value| value.trim().to_uppercase() == filter.trim().to_uppercase())
            .unwrap_or(false)
    }
}

impl BoundarySource for GeoJsonBoundarySource {
    fn describe(&self) -> String {
        self.label()
    }

    fn read_features(&self, stats: &mut LoadStats) -> Result<Vec<BoundaryFeature>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::io(
                format!("Failed to read boundary file {}", self.path.display()),
                e,
            )
        })?;

        let geojson: GeoJson = content
            .parse()
            .map_err(|e| Error::geojson(self.label(), e))?;
        let collection =
            FeatureCollection::try_from(geojson).map_err(|e| Error::geojson(self.label(), e))?;

        let mut features = Vec::with_capacity(collection.features.len());
        for (position, feature) in collection.features.into_iter().enumerate() {
            stats.features_read += 1;

            if !self.in_state(&feature) {
                stats.features_filtered += 1;
                continue;
            }

            let Some(name) = feature
                .property(&self.schema.district_field)
                .and_then(|value| value.as_str())
                .map(str::to_string)
                .filter(|name| !name.trim().is_empty())
            else {
                warn!(
                    "Feature {} in {} has no '{}' property, skipping",
                    position,
                    self.label(),
                    self.schema.district_field
                );
                stats.features_skipped += 1;
                continue;
            };

            let Some(geometry) = feature.geometry else {
                warn!("District '{}' in {} has no geometry, skipping", name, self.label());
                stats.features_skipped += 1;
                continue;
            };

            let geometry = Geometry::<f64>::try_from(geometry.value)
                .map_err(|e| Error::geojson(self.label(), e))?;
            match into_multipolygon(geometry) {
                Some(geometry) => features.push(BoundaryFeature { name, geometry }),
                None => {
                    warn!(
                        "District '{}' in {} is not a polygon geometry, skipping",
                        name,
                        self.label()
                    );
                    stats.features_skipped += 1;
                }
            }
        }

        debug!(
            "Read {} district features from {}",
            features.len(),
            self.label()
        );
        Ok(features)
    }
}

/// Collect the polygonal parts of a geometry
fn into_multipolygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let polygons = match geometry {
        Geometry::Polygon(polygon) => vec![polygon],
        Geometry::MultiPolygon(multi) => multi.0,
        Geometry::GeometryCollection(collection) => collection
            .0
            .into_iter()
            .filter_map(into_multipolygon)
            .flat_map(|multi| multi.0)
            .collect(),
        _ => Vec::new(),
    };

    if polygons.is_empty() {
        None
    } else {
        Some(MultiPolygon::new(polygons))
    }
}
