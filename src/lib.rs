//! # SPMD Kernel Benchmarks
//!
//! Distributed reductions, matrix multiplication and message-passing benchmarks
//! written against a communicator trait, with a timing harness and a sweep
//! runner on top. The in-process runtime runs every rank as a thread; the
//! `mpi` feature adds an MPI-backed communicator for real multi-process runs.

pub mod comm;
pub mod config;
pub mod error;
pub mod harness;
pub mod kernels;
pub mod matrix;
pub mod partition;
pub mod registry;
pub mod topology;
pub mod utils;

pub use utils::tui;

pub use utils::runner::{run_sweep, run_sweep_on};

/// Re-export commonly used items
pub mod prelude {
    pub use crate::comm::{Comm, ProcessGroup, ReduceOp, SendMode, Universe};
    pub use crate::config::BenchConfig;
    pub use crate::error::{BenchError, Result};
    pub use crate::matrix::Matrix;
    pub use crate::registry::{build_registry, Kernel, KernelKind};
}

#[cfg(test)]
mod tests {
    use crate::registry::build_registry;

    #[test]
    fn test_all_kernels_registry_verify() {
        let kernels = build_registry();

        println!("Verifying {} kernel variants...", kernels.len());

        for kernel in &kernels {
            println!("Verifying kernel: {} ({})", kernel.name(), kernel.variant());
            match kernel.verify() {
                Ok(_) => println!("  ✅ Kernel '{}' passed verification", kernel.name()),
                Err(e) => panic!("  ❌ Kernel '{}' failed verification: {}", kernel.name(), e),
            }
        }
    }
}
