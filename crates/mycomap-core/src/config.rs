//! Core data types and configuration for Mycomap.

use serde::{Deserialize, Serialize};

/// Kind of geolocated entity produced from a record row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Plant,
    Fungus,
}

impl FeatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plant => "Plant",
            Self::Fungus => "Fungus",
        }
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed cell value. Tokens that parse fully as a finite number become
/// `Number`; everything else is kept as trimmed `Text`. The same column may
/// hold either variant across rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
}

impl AttributeValue {
    /// Type a raw cell token.
    pub fn from_token(raw: &str) -> Self {
        let token = raw.trim();
        match token.parse::<f64>() {
            Ok(n) if n.is_finite() => Self::Number(n),
            _ => Self::Text(token.to_string()),
        }
    }

    /// JSON form of the value. Whole numbers are written without a fraction
    /// so `12` stays `12` rather than `12.0`. Returns `None` for non-finite
    /// numbers, which JSON cannot represent.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Text(s) => Some(serde_json::Value::String(s.clone())),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                Some(serde_json::Value::from(*n as i64))
            }
            Self::Number(n) => serde_json::Number::from_f64(*n).map(serde_json::Value::Number),
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Attribute bag of an entity, keyed by trimmed column name, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, AttributeValue)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Join key shared by plants and fungi: (plant species, fungal genus).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchingKey {
    pub plant_species: String,
    pub fungal_genus: String,
}

impl MatchingKey {
    /// True when either component holds the default placeholder.
    pub fn uses_default(&self, default_value: &str) -> bool {
        self.plant_species == default_value || self.fungal_genus == default_value
    }
}

impl std::fmt::Display for MatchingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.plant_species, self.fungal_genus)
    }
}

/// A validated, geolocated plant or fungus record.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoEntity {
    pub kind: FeatureKind,
    pub longitude: f64,
    pub latitude: f64,
    pub key: MatchingKey,
    pub attributes: Attributes,
}

impl GeoEntity {
    /// Coordinates in GIS order.
    pub fn coordinates(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

/// A derived line between one plant and one fungus with equal keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    /// Position of the plant in the plant collection.
    pub plant_index: usize,
    /// Position of the fungus in the fungus collection.
    pub fungus_index: usize,
    pub plant_coordinates: [f64; 2],
    pub fungus_coordinates: [f64; 2],
    pub key: MatchingKey,
    /// Functional group of the plant side, passed through untouched.
    pub functional_group: Option<AttributeValue>,
    /// The key contains the default placeholder, so the match may be a
    /// collision between two rows that both lacked the key columns.
    pub default_key: bool,
}

/// Configuration for a load cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Human-readable label of the payload origin, recorded in metadata.
    #[serde(default)]
    pub source: String,
    pub output_path: Option<String>,
    /// Forced delimiter; auto-detected when `None`.
    pub delimiter: Option<char>,
    #[serde(default = "default_plant_lat_column")]
    pub plant_lat_column: String,
    #[serde(default = "default_plant_long_column")]
    pub plant_long_column: String,
    #[serde(default = "default_fungus_lat_column")]
    pub fungus_lat_column: String,
    #[serde(default = "default_fungus_long_column")]
    pub fungus_long_column: String,
    #[serde(default = "default_plant_species_column")]
    pub plant_species_column: String,
    #[serde(default = "default_fungal_genus_column")]
    pub fungal_genus_column: String,
    #[serde(default = "default_functional_group_column")]
    pub functional_group_column: String,
    #[serde(default = "default_missing_sentinel")]
    pub missing_sentinel: String,
    #[serde(default = "default_unknown_value")]
    pub unknown_value: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub quiet: bool,
}

fn default_plant_lat_column() -> String {
    "Plant_Lat".to_string()
}
fn default_plant_long_column() -> String {
    "Plant_Long".to_string()
}
fn default_fungus_lat_column() -> String {
    "Fung_Lat".to_string()
}
fn default_fungus_long_column() -> String {
    "Fung_Long".to_string()
}
fn default_plant_species_column() -> String {
    "PlantSpecies".to_string()
}
fn default_fungal_genus_column() -> String {
    "FungalGenus".to_string()
}
fn default_functional_group_column() -> String {
    "FUNGROUP".to_string()
}
fn default_missing_sentinel() -> String {
    "NA".to_string()
}
fn default_unknown_value() -> String {
    "Unknown".to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            output_path: None,
            delimiter: None,
            plant_lat_column: default_plant_lat_column(),
            plant_long_column: default_plant_long_column(),
            fungus_lat_column: default_fungus_lat_column(),
            fungus_long_column: default_fungus_long_column(),
            plant_species_column: default_plant_species_column(),
            fungal_genus_column: default_fungal_genus_column(),
            functional_group_column: default_functional_group_column(),
            missing_sentinel: default_missing_sentinel(),
            unknown_value: default_unknown_value(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            verbose: false,
            quiet: false,
        }
    }
}

impl MapConfig {
    /// Latitude and longitude column names for one side of a row.
    pub fn coordinate_columns(&self, kind: FeatureKind) -> (&str, &str) {
        match kind {
            FeatureKind::Plant => (&self.plant_lat_column, &self.plant_long_column),
            FeatureKind::Fungus => (&self.fungus_lat_column, &self.fungus_long_column),
        }
    }
}
