// PerfSleuth - core/mod.rs
//
// Core business logic layer: extraction, scoring, aggregation, export.
// Must NOT depend on: app or platform.

pub mod aggregate;
pub mod discovery;
pub mod export;
pub mod extractor;
pub mod model;
pub mod recommend;
