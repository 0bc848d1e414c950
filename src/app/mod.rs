// PerfSleuth - app/mod.rs
//
// Application layer: batch orchestration, result reloading and output
// writing.
// Dependencies: core, platform.

pub mod output;
pub mod pipeline;
pub mod reload;
