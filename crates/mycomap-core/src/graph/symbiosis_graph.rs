//! In-memory symbiosis graph backed by petgraph::DiGraph.
//!
//! Plants and fungi are nodes; each connection is a plant → fungus edge.
//! Node and edge indices follow insertion order, which is the order the
//! output collections are written in.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::Direction;

use crate::config::{Connection, FeatureKind, GeoEntity};
use crate::error::LoadError;

/// Wrapper around petgraph::DiGraph with typed entity/connection methods.
#[derive(Debug, Default)]
pub struct SymbiosisGraph {
    graph: DiGraph<GeoEntity, Connection>,
    /// Node index of each plant, by position in the plant collection.
    plants: Vec<NodeIndex>,
    /// Node index of each fungus, by position in the fungus collection.
    fungi: Vec<NodeIndex>,
}

impl SymbiosisGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph holding `plants` then `fungi`, without connections.
    pub fn from_entities(plants: Vec<GeoEntity>, fungi: Vec<GeoEntity>) -> Self {
        let mut graph = Self::new();
        for entity in plants.into_iter().chain(fungi) {
            graph.add_entity(entity);
        }
        graph
    }

    // --- Mutation ---

    /// Add an entity and return its position within its kind's collection.
    pub fn add_entity(&mut self, entity: GeoEntity) -> usize {
        let kind = entity.kind;
        let idx = self.graph.add_node(entity);
        let list = self.indices_mut(kind);
        list.push(idx);
        list.len() - 1
    }

    /// Add a connection edge. Both endpoint positions must already exist.
    pub fn add_connection(&mut self, connection: Connection) -> Result<EdgeIndex, LoadError> {
        let plant_idx = self.plants.get(connection.plant_index).copied().ok_or_else(|| {
            LoadError::TransformFailure(format!(
                "connection references missing plant #{}",
                connection.plant_index
            ))
        })?;
        let fungus_idx = self.fungi.get(connection.fungus_index).copied().ok_or_else(|| {
            LoadError::TransformFailure(format!(
                "connection references missing fungus #{}",
                connection.fungus_index
            ))
        })?;
        Ok(self.graph.add_edge(plant_idx, fungus_idx, connection))
    }

    fn indices(&self, kind: FeatureKind) -> &[NodeIndex] {
        match kind {
            FeatureKind::Plant => &self.plants,
            FeatureKind::Fungus => &self.fungi,
        }
    }

    fn indices_mut(&mut self, kind: FeatureKind) -> &mut Vec<NodeIndex> {
        match kind {
            FeatureKind::Plant => &mut self.plants,
            FeatureKind::Fungus => &mut self.fungi,
        }
    }

    // --- Queries ---

    /// Entities of one kind, in collection order.
    pub fn entities(&self, kind: FeatureKind) -> impl Iterator<Item = &GeoEntity> + '_ {
        self.indices(kind)
            .iter()
            .filter_map(move |&idx| self.graph.node_weight(idx))
    }

    /// Connections in the order they were added.
    pub fn get_connections(&self) -> Vec<&Connection> {
        self.graph.edge_weights().collect()
    }

    /// Number of connections touching an entity, counting repeats.
    pub fn partner_count(&self, kind: FeatureKind, position: usize) -> usize {
        let Some(&idx) = self.indices(kind).get(position) else {
            return 0;
        };
        let direction = match kind {
            FeatureKind::Plant => Direction::Outgoing,
            FeatureKind::Fungus => Direction::Incoming,
        };
        self.graph.edges_directed(idx, direction).count()
    }

    /// Entities with no connection at all.
    pub fn isolated_count(&self) -> usize {
        [FeatureKind::Plant, FeatureKind::Fungus]
            .into_iter()
            .map(|kind| {
                (0..self.indices(kind).len())
                    .filter(|&position| self.partner_count(kind, position) == 0)
                    .count()
            })
            .sum()
    }

    pub fn plant_count(&self) -> usize {
        self.plants.len()
    }

    pub fn fungus_count(&self) -> usize {
        self.fungi.len()
    }

    pub fn entity_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn connection_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Attributes, MatchingKey};

    fn key(species: &str) -> MatchingKey {
        MatchingKey {
            plant_species: species.to_string(),
            fungal_genus: "Glomus".to_string(),
        }
    }

    fn entity(kind: FeatureKind, lon: f64, species: &str) -> GeoEntity {
        GeoEntity {
            kind,
            longitude: lon,
            latitude: 0.0,
            key: key(species),
            attributes: Attributes::new(),
        }
    }

    fn connection(plant_index: usize, fungus_index: usize) -> Connection {
        Connection {
            plant_index,
            fungus_index,
            plant_coordinates: [0.0, 0.0],
            fungus_coordinates: [1.0, 1.0],
            key: key("Oak"),
            functional_group: None,
            default_key: false,
        }
    }

    #[test]
    fn entities_keep_collection_order() {
        let mut graph = SymbiosisGraph::new();
        // Interleaved insertion still yields per-kind order.
        assert_eq!(graph.add_entity(entity(FeatureKind::Fungus, 10.0, "Oak")), 0);
        assert_eq!(graph.add_entity(entity(FeatureKind::Plant, 1.0, "Oak")), 0);
        assert_eq!(graph.add_entity(entity(FeatureKind::Plant, 2.0, "Elm")), 1);

        let plant_lons: Vec<f64> = graph
            .entities(FeatureKind::Plant)
            .map(|e| e.longitude)
            .collect();
        assert_eq!(plant_lons, vec![1.0, 2.0]);
        assert_eq!(graph.fungus_count(), 1);
        assert_eq!(graph.entity_count(), 3);
    }

    #[test]
    fn partner_and_isolated_counts() {
        let mut graph = SymbiosisGraph::from_entities(
            vec![entity(FeatureKind::Plant, 1.0, "Oak"), entity(FeatureKind::Plant, 2.0, "Elm")],
            vec![entity(FeatureKind::Fungus, 3.0, "Oak")],
        );
        graph.add_connection(connection(0, 0)).unwrap();
        graph.add_connection(connection(0, 0)).unwrap();

        assert_eq!(graph.connection_count(), 2);
        assert_eq!(graph.partner_count(FeatureKind::Plant, 0), 2);
        assert_eq!(graph.partner_count(FeatureKind::Fungus, 0), 2);
        assert_eq!(graph.partner_count(FeatureKind::Plant, 1), 0);
        assert_eq!(graph.partner_count(FeatureKind::Plant, 9), 0);
        assert_eq!(graph.isolated_count(), 1);
    }

    #[test]
    fn dangling_connection_is_a_transform_failure() {
        let mut graph =
            SymbiosisGraph::from_entities(vec![entity(FeatureKind::Plant, 1.0, "Oak")], vec![]);
        let err = graph.add_connection(connection(0, 0)).unwrap_err();
        assert!(matches!(err, LoadError::TransformFailure(_)));
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn connections_keep_insertion_order() {
        let mut graph = SymbiosisGraph::from_entities(
            vec![entity(FeatureKind::Plant, 1.0, "Oak")],
            vec![entity(FeatureKind::Fungus, 3.0, "Oak"), entity(FeatureKind::Fungus, 4.0, "Oak")],
        );
        graph.add_connection(connection(0, 1)).unwrap();
        graph.add_connection(connection(0, 0)).unwrap();
        let order: Vec<usize> = graph.get_connections().iter().map(|c| c.fungus_index).collect();
        assert_eq!(order, vec![1, 0]);
        let fungus_lons: Vec<f64> = graph
            .entities(FeatureKind::Fungus)
            .map(|e| e.longitude)
            .collect();
        assert_eq!(fungus_lons, vec![3.0, 4.0]);
    }
}
