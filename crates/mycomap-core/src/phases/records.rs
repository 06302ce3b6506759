//! Phase 1: Split delimited text into rows, validate coordinates, build plant and fungus entities.

use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};

use crate::config::{AttributeValue, Attributes, FeatureKind, GeoEntity, MapConfig, MatchingKey};
use crate::error::{RejectionTally, RowRejection};

/// Delimiters tried by auto-detection, in preference order.
pub const DELIMITER_CANDIDATES: &[u8] = &[b',', b'\t', b'|', b';'];

/// Number of records sampled per candidate delimiter.
const DETECTION_PREVIEW_ROWS: usize = 10;

/// Minimum average field count for a candidate to be considered.
const MIN_AVERAGE_FIELDS: f64 = 1.99;

/// Summary of a parse, kept for diagnostics and output stats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseReport {
    pub delimiter: char,
    /// Trimmed header names, in column order.
    pub headers: Vec<String>,
    /// Non-blank data rows seen.
    pub rows: usize,
    pub plant_rejections: RejectionTally,
    pub fungus_rejections: RejectionTally,
}

/// Output of the records phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRecords {
    pub plants: Vec<GeoEntity>,
    pub fungi: Vec<GeoEntity>,
    pub report: ParseReport,
}

impl ParsedRecords {
    pub fn entity_count(&self) -> usize {
        self.plants.len() + self.fungi.len()
    }
}

/// Pick the delimiter whose preview records have the most consistent field
/// count. A later candidate replaces the current best only when it is at
/// least as consistent and splits rows into more fields on average. Falls
/// back to comma when no candidate averages at least two fields.
pub fn detect_delimiter(text: &str) -> u8 {
    // (delimiter, delta, average field count)
    let mut best: Option<(u8, usize, f64)> = None;

    for &delimiter in DELIMITER_CANDIDATES {
        let field_counts: Vec<usize> = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes())
            .records()
            .filter_map(Result::ok)
            .filter(|record| !is_blank(record))
            .take(DETECTION_PREVIEW_ROWS)
            .map(|record| record.len())
            .collect();

        if field_counts.is_empty() {
            continue;
        }

        let average = field_counts.iter().sum::<usize>() as f64 / field_counts.len() as f64;
        if average <= MIN_AVERAGE_FIELDS {
            continue;
        }

        let delta: usize = field_counts
            .windows(2)
            .map(|pair| pair[0].abs_diff(pair[1]))
            .sum();

        let improves = match best {
            None => true,
            Some((_, best_delta, best_average)) => delta <= best_delta && average > best_average,
        };
        if improves {
            best = Some((delimiter, delta, average));
        }
    }

    best.map(|(delimiter, _, _)| delimiter).unwrap_or(b',')
}

/// Check a raw coordinate token and return its value.
pub fn check_coord(raw: Option<&str>, sentinel: &str) -> Result<f64, RowRejection> {
    let token = raw.map(str::trim).ok_or(RowRejection::MissingCoordinate)?;
    if token == sentinel {
        return Err(RowRejection::Sentinel);
    }
    if token.is_empty() {
        return Err(RowRejection::MissingCoordinate);
    }
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(RowRejection::Unparseable),
    }
}

/// A coordinate token is valid when it is present, not the sentinel, not
/// blank, and a finite number.
pub fn is_valid_coord(raw: Option<&str>, sentinel: &str) -> bool {
    check_coord(raw, sentinel).is_ok()
}

/// Header names are trimmed of whitespace and a leading byte-order mark.
fn clean_header(name: &str) -> String {
    name.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .to_string()
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

/// Column layout resolved from the header row.
struct Columns {
    headers: Vec<String>,
    /// Trimmed name to cell index. Duplicate names resolve to the last column.
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(header_record: &StringRecord) -> Self {
        let headers: Vec<String> = header_record.iter().map(clean_header).collect();
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { headers, index }
    }

    fn raw<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.index.get(name).and_then(|&i| record.get(i))
    }
}

/// Run the records phase over the full payload.
pub fn run_records_phase(text: &str, config: &MapConfig) -> ParsedRecords {
    let delimiter = match config.delimiter {
        Some(c) if c.is_ascii() => c as u8,
        Some(c) => {
            log::warn!("Ignoring non-ASCII delimiter {c:?}, auto-detecting instead");
            detect_delimiter(text)
        }
        None => detect_delimiter(text),
    };
    log::debug!("Using delimiter {:?}", delimiter as char);

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns = match reader.headers() {
        Ok(header_record) => Columns::new(header_record),
        Err(e) => {
            log::warn!("Could not read header row: {e}");
            return ParsedRecords {
                report: ParseReport {
                    delimiter: delimiter as char,
                    ..Default::default()
                },
                ..Default::default()
            };
        }
    };

    let mut parsed = ParsedRecords {
        report: ParseReport {
            delimiter: delimiter as char,
            headers: columns.headers.clone(),
            ..Default::default()
        },
        ..Default::default()
    };

    for (row_index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                log::debug!("Skipping unreadable row {}: {e}", row_index + 1);
                continue;
            }
        };
        if is_blank(&record) {
            continue;
        }
        parsed.report.rows += 1;

        let (attributes, key) = build_attributes(&columns, &record, config);

        match locate(&columns, &record, config, FeatureKind::Plant) {
            Ok((longitude, latitude)) => parsed.plants.push(GeoEntity {
                kind: FeatureKind::Plant,
                longitude,
                latitude,
                key: key.clone(),
                attributes: attributes.clone(),
            }),
            Err(rejection) => {
                log::debug!("Row {}: no plant point ({rejection})", row_index + 1);
                parsed.report.plant_rejections.record(rejection);
            }
        }

        match locate(&columns, &record, config, FeatureKind::Fungus) {
            Ok((longitude, latitude)) => parsed.fungi.push(GeoEntity {
                kind: FeatureKind::Fungus,
                longitude,
                latitude,
                key,
                attributes,
            }),
            Err(rejection) => {
                log::debug!("Row {}: no fungus point ({rejection})", row_index + 1);
                parsed.report.fungus_rejections.record(rejection);
            }
        }
    }

    log::info!(
        "Created {} plant and {} fungus points from {} rows",
        parsed.plants.len(),
        parsed.fungi.len(),
        parsed.report.rows
    );

    parsed
}

/// Validate one side of a row, returning `(longitude, latitude)`.
fn locate(
    columns: &Columns,
    record: &StringRecord,
    config: &MapConfig,
    kind: FeatureKind,
) -> Result<(f64, f64), RowRejection> {
    let (lat_column, long_column) = config.coordinate_columns(kind);
    let sentinel = config.missing_sentinel.as_str();
    let latitude = check_coord(columns.raw(record, lat_column), sentinel)?;
    let longitude = check_coord(columns.raw(record, long_column), sentinel)?;
    Ok((longitude, latitude))
}

/// Build the attribute bag and matching key of a row. The key columns come
/// first and fall back to the unknown placeholder when absent or blank.
///
/// The key keeps the trimmed token text while the attribute is typed, so
/// `12` and `12.0` show the same `Number` attribute yet never join.
fn build_attributes(
    columns: &Columns,
    record: &StringRecord,
    config: &MapConfig,
) -> (Attributes, MatchingKey) {
    let key_component = |name: &str| -> Option<String> {
        columns
            .raw(record, name)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(String::from)
    };
    let species = key_component(&config.plant_species_column);
    let genus = key_component(&config.fungal_genus_column);

    let mut attributes = Attributes::new();
    for (column, value) in [
        (&config.plant_species_column, &species),
        (&config.fungal_genus_column, &genus),
    ] {
        let value = match value {
            Some(token) => AttributeValue::from_token(token),
            None => AttributeValue::Text(config.unknown_value.clone()),
        };
        attributes.insert(column.as_str(), value);
    }

    for (i, name) in columns.headers.iter().enumerate() {
        let Some(cell) = record.get(i) else {
            break;
        };
        // Key columns were inserted above with their default applied.
        if *name == config.plant_species_column || *name == config.fungal_genus_column {
            continue;
        }
        attributes.insert(name.as_str(), AttributeValue::from_token(cell));
    }

    let key = MatchingKey {
        plant_species: species.unwrap_or_else(|| config.unknown_value.clone()),
        fungal_genus: genus.unwrap_or_else(|| config.unknown_value.clone()),
    };

    (attributes, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedRecords {
        run_records_phase(text, &MapConfig::default())
    }

    #[test]
    fn detects_each_candidate_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3\n"), b',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3\n"), b'\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3\n"), b'|');
        assert_eq!(detect_delimiter("a;b;c\n1;2;3\n"), b';');
    }

    #[test]
    fn detection_prefers_consistent_field_counts() {
        // Commas appear inside the free-text column but vary per row.
        let text = "name;note;lat\nOak;big, old;1\nElm;tall;2\nAsh;a, b, c;3\n";
        assert_eq!(detect_delimiter(text), b';');
    }

    #[test]
    fn detection_prefers_more_fields_at_equal_consistency() {
        // Comma and semicolon are both consistent; semicolon splits finer.
        assert_eq!(detect_delimiter("a;b;c,d\n1;2;3,4\n"), b';');
    }

    #[test]
    fn detection_keeps_wider_candidate_over_narrower_consistent_one() {
        // Pipe is perfectly consistent but averages fewer fields than comma.
        assert_eq!(detect_delimiter("a,b,c|x\n1,2|y\n1,2,3,4,5|z\n"), b',');
    }

    #[test]
    fn detection_falls_back_to_comma() {
        assert_eq!(detect_delimiter("single\nvalue\n"), b',');
        assert_eq!(detect_delimiter(""), b',');
    }

    #[test]
    fn coord_validation_rules() {
        assert_eq!(check_coord(Some(" 40.7 "), "NA"), Ok(40.7));
        assert_eq!(check_coord(Some("NA"), "NA"), Err(RowRejection::Sentinel));
        assert_eq!(check_coord(Some(" NA "), "NA"), Err(RowRejection::Sentinel));
        assert_eq!(check_coord(None, "NA"), Err(RowRejection::MissingCoordinate));
        assert_eq!(check_coord(Some("   "), "NA"), Err(RowRejection::MissingCoordinate));
        assert_eq!(check_coord(Some("north"), "NA"), Err(RowRejection::Unparseable));
        assert_eq!(check_coord(Some("inf"), "NA"), Err(RowRejection::Unparseable));
        assert!(!is_valid_coord(Some("40.7abc"), "NA"));
        assert!(is_valid_coord(Some("-0"), "NA"));
    }

    #[test]
    fn header_cleanup_strips_whitespace_and_bom() {
        assert_eq!(clean_header(" Plant_Lat "), "Plant_Lat");
        assert_eq!(clean_header("\u{feff}PlantSpecies"), "PlantSpecies");
    }

    #[test]
    fn key_columns_lead_and_default() {
        let parsed = parse("LOCATION,Plant_Lat,Plant_Long\nIowa,41.5,-93.6\n");
        let plant = &parsed.plants[0];
        let keys: Vec<&str> = plant.attributes.keys().collect();
        assert_eq!(keys, vec!["PlantSpecies", "FungalGenus", "LOCATION", "Plant_Lat", "Plant_Long"]);
        assert_eq!(plant.key.plant_species, "Unknown");
        assert_eq!(plant.key.fungal_genus, "Unknown");
        assert_eq!(
            plant.attributes.get("FungalGenus"),
            Some(&AttributeValue::Text("Unknown".to_string()))
        );
    }

    #[test]
    fn blank_key_cell_uses_default() {
        let parsed = parse("PlantSpecies,FungalGenus,Plant_Lat,Plant_Long\n  ,Glomus,1,2\n");
        let plant = &parsed.plants[0];
        assert_eq!(plant.key.plant_species, "Unknown");
        assert_eq!(plant.key.fungal_genus, "Glomus");
    }

    #[test]
    fn numeric_and_text_cells_coexist() {
        let parsed = parse(
            "PlantSpecies,FungalGenus,Plant_Lat,Plant_Long,PLOT\nOak,Glomus,1,2,12\nOak,Glomus,1,2,12b\n",
        );
        assert_eq!(parsed.plants[0].attributes.get("PLOT"), Some(&AttributeValue::Number(12.0)));
        assert_eq!(
            parsed.plants[1].attributes.get("PLOT"),
            Some(&AttributeValue::Text("12b".to_string()))
        );
    }

    #[test]
    fn short_rows_lack_trailing_attributes() {
        let parsed = parse("Plant_Lat,Plant_Long,LOCATION\n1,2\n");
        assert_eq!(parsed.plants.len(), 1);
        assert!(!parsed.plants[0].attributes.contains_key("LOCATION"));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let parsed = parse("Plant_Lat,Plant_Long\n1,2\n\n , \n3,4\n");
        assert_eq!(parsed.report.rows, 2);
        assert_eq!(parsed.plants.len(), 2);
    }

    #[test]
    fn rejections_are_tallied_per_side() {
        let parsed = parse(
            "Plant_Lat,Plant_Long,Fung_Lat,Fung_Long\nNA,2,x,4\n,2,5,6\n",
        );
        assert!(parsed.plants.is_empty());
        assert_eq!(parsed.fungi.len(), 1);
        assert_eq!(parsed.report.plant_rejections.sentinel, 1);
        assert_eq!(parsed.report.plant_rejections.missing, 1);
        assert_eq!(parsed.report.fungus_rejections.unparseable, 1);
    }

    #[test]
    fn forced_delimiter_overrides_detection() {
        let config = MapConfig {
            delimiter: Some('|'),
            ..Default::default()
        };
        let parsed = run_records_phase("Plant_Lat|Plant_Long\n1|2\n", &config);
        assert_eq!(parsed.report.delimiter, '|');
        assert_eq!(parsed.plants.len(), 1);
    }
}
