//! Phase 2: Pair every plant with every fungus sharing its matching key.

use crate::config::{Connection, GeoEntity, MapConfig};

/// Derive connections in plant-major, fungus-minor order.
///
/// The join is a full pairwise scan: one connection per equal-key pair, so
/// repeated keys yield the cartesian product. Keys compare by exact,
/// case-sensitive string equality, including the unknown placeholder, which
/// means two rows both lacking key columns will match. Such connections are
/// flagged with `default_key` and counted in a warning.
pub fn derive_connections(
    plants: &[GeoEntity],
    fungi: &[GeoEntity],
    config: &MapConfig,
) -> Vec<Connection> {
    let mut connections = Vec::new();

    for (plant_index, plant) in plants.iter().enumerate() {
        let functional_group = plant
            .attributes
            .get(&config.functional_group_column)
            .cloned();

        for (fungus_index, fungus) in fungi.iter().enumerate() {
            if plant.key != fungus.key {
                continue;
            }
            connections.push(Connection {
                plant_index,
                fungus_index,
                plant_coordinates: plant.coordinates(),
                fungus_coordinates: fungus.coordinates(),
                key: plant.key.clone(),
                functional_group: functional_group.clone(),
                default_key: plant.key.uses_default(&config.unknown_value),
            });
        }
    }

    let default_matches = count_default_key(&connections);
    if default_matches > 0 {
        log::warn!(
            "{default_matches} of {} connections matched on the {:?} placeholder key",
            connections.len(),
            config.unknown_value
        );
    }
    log::info!(
        "Created {} connection lines between {} plants and {} fungi",
        connections.len(),
        plants.len(),
        fungi.len()
    );

    connections
}

/// Number of connections whose key contains the unknown placeholder.
pub fn count_default_key<'a>(connections: impl IntoIterator<Item = &'a Connection>) -> usize {
    connections.into_iter().filter(|c| c.default_key).count()
}
