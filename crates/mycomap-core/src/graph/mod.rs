pub mod symbiosis_graph;
