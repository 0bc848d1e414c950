// PerfSleuth - platform/mod.rs
//
// Platform abstraction layer: config file location and loading, file reads.
// Dependencies: standard library, directories, memmap2, core value types.
// Must NOT depend on: app.

pub mod config;
pub mod fs;
