//! Pipeline phases, run in order by [`crate::pipeline::run_pipeline`].

pub mod connections;
pub mod records;
