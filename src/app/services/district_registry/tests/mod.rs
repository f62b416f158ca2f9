//! Shared fixtures for district registry tests

use geo::{MultiPolygon, polygon};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

pub mod loader_tests;

/// Axis-aligned square with its lower-left corner at (x, y)
pub fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: x, y: y),
        (x: x + size, y: y),
        (x: x + size, y: y + size),
        (x: x, y: y + size),
        (x: x, y: y),
    ]])
}

/// GeoJSON feature with a square polygon and the given properties
pub fn square_feature(x: f64, y: f64, size: f64, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "properties": properties,
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [x, y],
                [x + size, y],
                [x + size, y + size],
                [x, y + size],
                [x, y]
            ]]
        }
    })
}

/// Write a FeatureCollection and return its path
pub fn write_feature_collection(dir: &Path, name: &str, features: Vec<Value>) -> PathBuf {
    let path = dir.join(name);
    let collection = json!({ "type": "FeatureCollection", "features": features });
    fs::write(&path, collection.to_string()).unwrap();
    path
}
