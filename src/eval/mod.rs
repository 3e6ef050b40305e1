// eval/mod.rs - Graph compilation and batched evaluation

pub mod cache;
pub mod compiled;
pub mod graph;
pub mod grid;
pub mod lanes;
pub mod noise;
pub mod nodes;
