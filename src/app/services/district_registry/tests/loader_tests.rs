//! Tests for GeoJSON boundary loading

use super::*;
use crate::app::services::canonicalizer::DistrictCanonicalizer;
use crate::app::services::district_registry::{
    BoundarySource, DistrictRegistry, GeoJsonBoundarySource, LoadStats,
};
use crate::config::{BoundarySchema, StateConfig};
use crate::Error;
use serde_json::json;
use tempfile::TempDir;

fn maharashtra_schema() -> BoundarySchema {
    StateConfig::maharashtra().boundary_schema
}

#[test]
fn test_state_filter_is_case_insensitive() {
    let dir = TempDir::new().unwrap();
    let path = write_feature_collection(
        dir.path(),
        "districts.geojson",
        vec![
            square_feature(0.0, 0.0, 1.0, json!({"DISTRICT": "PUNE", "STATE": "MAHARASHTRA"})),
            square_feature(1.0, 0.0, 1.0, json!({"DISTRICT": "NASHIK", "STATE": "Maharashtra "})),
            square_feature(5.0, 0.0, 1.0, json!({"DISTRICT": "INDORE", "STATE": "MADHYA PRADESH"})),
        ],
    );

    let source = GeoJsonBoundarySource::new(&path, maharashtra_schema());
    let mut stats = LoadStats::default();
    let features = source.read_features(&mut stats).unwrap();

    let names: Vec<_> = features.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["PUNE", "NASHIK"]);
    assert_eq!(stats.features_read, 3);
    assert_eq!(stats.features_filtered, 1);
}

#[test]
fn test_unfiltered_schema_keeps_every_named_polygon() {
    let dir = TempDir::new().unwrap();
    let path = write_feature_collection(
        dir.path(),
        "mp.geojson",
        vec![
            square_feature(0.0, 0.0, 1.0, json!({"dtname": "Narsimhapur"})),
            square_feature(1.0, 0.0, 1.0, json!({"dtname": "Indore"})),
            square_feature(2.0, 0.0, 1.0, json!({"other": "unnamed"})),
            json!({
                "type": "Feature",
                "properties": {"dtname": "Point"},
                "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}
            }),
        ],
    );

    let source = GeoJsonBoundarySource::new(&path, StateConfig::madhya_pradesh().boundary_schema);
    let (registry, stats) = DistrictRegistry::load(
        &source,
        "Madhya Pradesh",
        &StateConfig::madhya_pradesh().canonicalizer().unwrap(),
    )
    .unwrap();

    assert_eq!(registry.districts().collect::<Vec<_>>(), ["indore", "narsimhapur"]);
    assert_eq!(stats.features_skipped, 2);
}

#[test]
fn test_filter_leaving_no_districts_aborts() {
    let dir = TempDir::new().unwrap();
    let path = write_feature_collection(
        dir.path(),
        "districts.geojson",
        vec![square_feature(
            0.0,
            0.0,
            1.0,
            json!({"DISTRICT": "INDORE", "STATE": "MADHYA PRADESH"}),
        )],
    );

    let source = GeoJsonBoundarySource::new(&path, maharashtra_schema());
    let result = DistrictRegistry::load(&source, "Maharashtra", &DistrictCanonicalizer::default());
    assert!(matches!(result, Err(Error::Boundary { .. })));
}

#[test]
fn test_missing_file_is_io_error() {
    let source = GeoJsonBoundarySource::new("/nonexistent/districts.geojson", maharashtra_schema());
    let result = source.read_features(&mut LoadStats::default());
    assert!(matches!(result, Err(Error::Io { .. })));
}

#[test]
fn test_malformed_geojson_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.geojson");
    std::fs::write(&path, "{\"type\": \"FeatureCollection\"").unwrap();

    let source = GeoJsonBoundarySource::new(&path, maharashtra_schema());
    let result = source.read_features(&mut LoadStats::default());
    assert!(matches!(result, Err(Error::GeoJson { .. })));
}
