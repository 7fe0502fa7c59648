//! Utility modules for running sweeps and presenting results.

pub mod affinity;
pub mod bench;
pub mod runner;
pub mod tui;

pub use affinity::CpuPinGuard;
pub use bench::{export_csv, time_seed, ResultRecord};
