//! Sequential phase orchestrator with timing.

use std::collections::HashMap;
use std::time::Instant;

use crate::config::MapConfig;
use crate::error::LoadError;
use crate::graph::symbiosis_graph::SymbiosisGraph;
use crate::output::{build_result, MapData};
use crate::phases;

/// Phase labels for progress reporting.
pub const PHASE_LABELS: &[(&str, &str)] = &[
    ("records", "Parsing and validating records"),
    ("connections", "Deriving plant-fungus connections"),
    ("graph", "Assembling map features"),
];

/// Progress callback type: (phase_name, label).
pub type ProgressCallback = Box<dyn FnMut(&str, &str)>;

fn report_progress(progress: &mut Option<&mut ProgressCallback>, name: &str) {
    if let Some(cb) = progress {
        let label = PHASE_LABELS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, l)| *l)
            .unwrap_or(name);
        cb(name, label);
    }
}

/// Transform raw delimited text into map data.
///
/// Pure with respect to its input: the same text and config always yield the
/// same collections in the same order. Nothing is returned unless every
/// phase succeeds.
pub fn run_pipeline(
    text: &str,
    config: &MapConfig,
    mut progress: Option<&mut ProgressCallback>,
) -> Result<MapData, LoadError> {
    let mut timings: HashMap<String, f64> = HashMap::new();
    let total_start = Instant::now();

    report_progress(&mut progress, "records");
    let start = Instant::now();
    let parsed = phases::records::run_records_phase(text, config);
    timings.insert("records".to_string(), start.elapsed().as_secs_f64());

    if parsed.entity_count() == 0 {
        log::error!("No valid features created from {} rows", parsed.report.rows);
        return Err(LoadError::NoUsableRecords {
            rows: parsed.report.rows,
        });
    }

    report_progress(&mut progress, "connections");
    let start = Instant::now();
    let connections =
        phases::connections::derive_connections(&parsed.plants, &parsed.fungi, config);
    timings.insert("connections".to_string(), start.elapsed().as_secs_f64());

    report_progress(&mut progress, "graph");
    let start = Instant::now();
    let mut graph = SymbiosisGraph::from_entities(parsed.plants, parsed.fungi);
    for connection in connections {
        graph.add_connection(connection)?;
    }
    timings.insert("graph".to_string(), start.elapsed().as_secs_f64());
    log::debug!(
        "Graph holds {} entities and {} connections",
        graph.entity_count(),
        graph.connection_count()
    );

    let total_ms = total_start.elapsed().as_secs_f64() * 1000.0;

    build_result(config, &graph, &parsed.report, &timings, total_ms)
}
