// PerfSleuth - lib.rs
//
// Library entry point, exposing every module for integration testing and
// programmatic use. The command-line adapter lives in `main.rs`.

pub mod app;
pub mod core;
pub mod platform;
pub mod util;
