//! GeoJSON serialisation handed to the rendering layer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{Connection, FeatureKind, GeoEntity, MapConfig};
use crate::error::LoadError;
use crate::graph::symbiosis_graph::SymbiosisGraph;
use crate::phases::connections::count_default_key;
use crate::phases::records::ParseReport;

/// Geometry of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    LineString { coordinates: Vec<[f64; 2]> },
}

/// A GeoJSON feature with a flat property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub feature_type: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry, properties: Map<String, Value>) -> Self {
        Self {
            feature_type: "Feature".to_string(),
            geometry,
            properties,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub collection_type: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            collection_type: "FeatureCollection".to_string(),
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Complete result of a load cycle, as handed to the rendering layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapData {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default)]
    pub stats: HashMap<String, Value>,
    #[serde(default)]
    pub plants: FeatureCollection,
    #[serde(default)]
    pub fungi: FeatureCollection,
    #[serde(default)]
    pub connections: FeatureCollection,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for MapData {
    fn default() -> Self {
        Self {
            version: default_version(),
            metadata: HashMap::new(),
            stats: HashMap::new(),
            plants: FeatureCollection::default(),
            fungi: FeatureCollection::default(),
            connections: FeatureCollection::default(),
        }
    }
}

impl MapData {
    /// Read a numeric stat, treating a missing key as zero.
    pub fn stat(&self, key: &str) -> u64 {
        self.stats.get(key).and_then(Value::as_u64).unwrap_or(0)
    }
}

fn coordinate_error(what: &str, coords: [f64; 2]) -> LoadError {
    LoadError::TransformFailure(format!("{what} has non-finite coordinates {coords:?}"))
}

fn check_finite(what: &str, coords: [f64; 2]) -> Result<[f64; 2], LoadError> {
    if coords.iter().all(|c| c.is_finite()) {
        Ok(coords)
    } else {
        Err(coordinate_error(what, coords))
    }
}

/// Point feature for an entity: `type` first, then the attribute bag.
pub fn entity_feature(entity: &GeoEntity) -> Result<Feature, LoadError> {
    let coordinates = check_finite(entity.kind.as_str(), entity.coordinates())?;

    let mut properties = Map::new();
    properties.insert(
        "type".to_string(),
        Value::String(entity.kind.as_str().to_string()),
    );
    for (name, value) in entity.attributes.iter() {
        let json = value.to_json().ok_or_else(|| {
            LoadError::TransformFailure(format!("attribute {name:?} holds a non-finite number"))
        })?;
        properties.insert(name.to_string(), json);
    }

    Ok(Feature::new(Geometry::Point { coordinates }, properties))
}

/// Line feature for a connection, plant end first.
pub fn connection_feature(connection: &Connection) -> Result<Feature, LoadError> {
    let start = check_finite("connection start", connection.plant_coordinates)?;
    let end = check_finite("connection end", connection.fungus_coordinates)?;

    let fungroup = match &connection.functional_group {
        Some(value) => value.to_json().ok_or_else(|| {
            LoadError::TransformFailure("functional group holds a non-finite number".to_string())
        })?,
        None => Value::Null,
    };

    let mut properties = Map::new();
    properties.insert(
        "start-species".to_string(),
        Value::String(connection.key.plant_species.clone()),
    );
    properties.insert(
        "end-genus".to_string(),
        Value::String(connection.key.fungal_genus.clone()),
    );
    properties.insert("fungroup".to_string(), fungroup);

    Ok(Feature::new(
        Geometry::LineString {
            coordinates: vec![start, end],
        },
        properties,
    ))
}

fn collect_entities(graph: &SymbiosisGraph, kind: FeatureKind) -> Result<FeatureCollection, LoadError> {
    graph
        .entities(kind)
        .map(entity_feature)
        .collect::<Result<Vec<_>, _>>()
        .map(FeatureCollection::new)
}

/// Build the MapData from the populated graph. Fails as a whole if any
/// feature cannot be assembled.
pub fn build_result(
    config: &MapConfig,
    graph: &SymbiosisGraph,
    report: &ParseReport,
    timings: &HashMap<String, f64>,
    total_ms: f64,
) -> Result<MapData, LoadError> {
    let plants = collect_entities(graph, FeatureKind::Plant)?;
    let fungi = collect_entities(graph, FeatureKind::Fungus)?;

    let connection_list = graph.get_connections();
    let connections = connection_list
        .iter()
        .copied()
        .map(connection_feature)
        .collect::<Result<Vec<_>, _>>()
        .map(FeatureCollection::new)?;

    let default_key_connections = count_default_key(connection_list.iter().copied());

    // Build metadata
    let mut metadata = HashMap::new();
    metadata.insert("source".to_string(), Value::String(config.source.clone()));
    metadata.insert(
        "generated_at".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    metadata.insert(
        "mycomap_version".to_string(),
        Value::String(env!("CARGO_PKG_VERSION").to_string()),
    );
    metadata.insert(
        "delimiter".to_string(),
        Value::String(report.delimiter.to_string()),
    );
    metadata.insert(
        "duration_ms".to_string(),
        serde_json::json!(((total_ms * 10.0).round() / 10.0)),
    );
    metadata.insert(
        "phase_timings".to_string(),
        serde_json::to_value(timings).unwrap_or_default(),
    );

    // Build stats
    let mut stats = HashMap::new();
    stats.insert("rows".to_string(), serde_json::json!(report.rows));
    stats.insert("plants".to_string(), serde_json::json!(graph.plant_count()));
    stats.insert("fungi".to_string(), serde_json::json!(graph.fungus_count()));
    stats.insert(
        "connections".to_string(),
        serde_json::json!(graph.connection_count()),
    );
    stats.insert(
        "default_key_connections".to_string(),
        serde_json::json!(default_key_connections),
    );
    stats.insert(
        "isolated_entities".to_string(),
        serde_json::json!(graph.isolated_count()),
    );
    stats.insert(
        "plant_rejections".to_string(),
        serde_json::json!(report.plant_rejections.total()),
    );
    stats.insert(
        "fungus_rejections".to_string(),
        serde_json::json!(report.fungus_rejections.total()),
    );

    Ok(MapData {
        version: default_version(),
        metadata,
        stats,
        plants,
        fungi,
        connections,
    })
}

/// Write the map data to a JSON file. The JSON goes to a sibling `.tmp` file
/// first and is renamed into place, so the target is either the complete new
/// document or left untouched.
pub fn write_output(data: &MapData, output_path: &str) -> std::io::Result<()> {
    let path = Path::new(output_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(data).map_err(std::io::Error::other)?;

    let tmp_path = temp_path(path);
    let written = std::fs::write(&tmp_path, json).and_then(|_| std::fs::rename(&tmp_path, path));
    if written.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    written
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
