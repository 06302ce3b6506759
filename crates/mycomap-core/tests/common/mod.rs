//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use mycomap_core::config::MapConfig;
use mycomap_core::error::LoadError;
use mycomap_core::output::{Feature, FeatureCollection, Geometry, MapData};
use mycomap_core::phases::records::{run_records_phase, ParsedRecords};
use mycomap_core::pipeline::run_pipeline;

// ---------------------------------------------------------------------------
// Fixture path resolution
// ---------------------------------------------------------------------------

/// Resolve `tests/fixtures/{name}` relative to the workspace root.
pub fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir)
        .join("../../tests/fixtures")
        .join(name)
        .canonicalize()
        .unwrap_or_else(|_| {
            Path::new(manifest_dir)
                .join("../../tests/fixtures")
                .join(name)
        })
}

pub fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name))
        .unwrap_or_else(|e| panic!("fixture {name} unreadable: {e}"))
}

// ---------------------------------------------------------------------------
// Phase runners
// ---------------------------------------------------------------------------

/// Run the records phase on literal text with the default config.
pub fn parse_text(text: &str) -> ParsedRecords {
    run_records_phase(text, &MapConfig::default())
}

/// Run the records phase on a fixture file.
pub fn parse_fixture(name: &str) -> ParsedRecords {
    parse_text(&read_fixture(name))
}

/// Run the full pipeline on literal text.
pub fn run_text(text: &str) -> Result<MapData, LoadError> {
    run_pipeline(text, &MapConfig::default(), None)
}

/// Run the full pipeline on a fixture file.
pub fn run_fixture(name: &str) -> Result<MapData, LoadError> {
    let config = MapConfig {
        source: name.to_string(),
        ..Default::default()
    };
    run_pipeline(&read_fixture(name), &config, None)
}

/// Build delimited text from a header and rows.
pub fn table(header: &[&str], rows: &[&[&str]]) -> String {
    let mut text = header.join(",");
    text.push('\n');
    for row in rows {
        text.push_str(&row.join(","));
        text.push('\n');
    }
    text
}

// ---------------------------------------------------------------------------
// Extractors from MapData
// ---------------------------------------------------------------------------

/// Point coordinates of each feature, in order.
pub fn points(collection: &FeatureCollection) -> Vec<[f64; 2]> {
    collection
        .features
        .iter()
        .filter_map(|f| match &f.geometry {
            Geometry::Point { coordinates } => Some(*coordinates),
            Geometry::LineString { .. } => None,
        })
        .collect()
}

/// Line endpoints of each feature, in order.
pub fn lines(collection: &FeatureCollection) -> Vec<Vec<[f64; 2]>> {
    collection
        .features
        .iter()
        .filter_map(|f| match &f.geometry {
            Geometry::LineString { coordinates } => Some(coordinates.clone()),
            Geometry::Point { .. } => None,
        })
        .collect()
}

/// String form of a property, or `None` if absent.
pub fn prop(feature: &Feature, key: &str) -> Option<String> {
    feature.properties.get(key).map(|v| match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}
