//! Mycomap Core: transformation engine for plant-fungus symbiosis maps.
//!
//! This crate contains all transformation logic: delimited-text parsing,
//! coordinate validation, plant/fungus entity construction, connection
//! derivation, GeoJSON assembly, source loading, and the map session lifecycle.

pub mod config;
pub mod error;
pub mod graph;
pub mod output;
pub mod phases;
pub mod pipeline;
pub mod session;
pub mod source;
