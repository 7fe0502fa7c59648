//! Benchmark configuration loaded from JSON.
//!
//! Every field is optional; a missing field takes its default. The CLI
//! applies its flags on top of whatever the file provides.

use crate::error::{BenchError, Result};
use crate::kernels::balance::{DEFAULT_COMM_ROUNDS, DEFAULT_COMPUTE_ITERS};
use crate::kernels::ping_pong::DEFAULT_ROUND_TRIPS;
use crate::registry::KernelKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Kernels to run, in order
    pub kernels: Vec<KernelKind>,
    /// Problem sizes: vector length or matrix order
    pub sizes: Vec<usize>,
    /// Process counts; one universe is launched per entry
    pub processes: Vec<usize>,
    pub repeats: usize,
    /// Send modes for the send-mode kernel, by name (`send`, `ssend`, ...)
    pub modes: Vec<String>,
    /// Direction of the min/max kernel
    pub find_min: bool,
    pub message_bytes: usize,
    pub round_trips: usize,
    pub comm_rounds: usize,
    pub compute_iters: usize,
    /// Input seed; time-based when absent
    pub seed: Option<u64>,
    pub pin_ranks: bool,
    pub csv: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            kernels: KernelKind::ALL.to_vec(),
            sizes: vec![600],
            processes: vec![1, 2, 4],
            repeats: 3,
            modes: ["send", "ssend", "rsend", "bsend"]
                .map(String::from)
                .to_vec(),
            find_min: true,
            message_bytes: 1024,
            round_trips: DEFAULT_ROUND_TRIPS,
            comm_rounds: DEFAULT_COMM_ROUNDS,
            compute_iters: DEFAULT_COMPUTE_ITERS,
            seed: None,
            pin_ranks: false,
            csv: None,
        }
    }
}

impl BenchConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| -> Result<()> { Err(BenchError::InvalidConfig(msg.to_string())) };
        if self.kernels.is_empty() {
            return fail("no kernels selected");
        }
        if self.sizes.is_empty() {
            return fail("no problem sizes given");
        }
        if self.processes.is_empty() {
            return fail("no process counts given");
        }
        if self.processes.contains(&0) {
            return fail("process counts must be at least 1");
        }
        if self.repeats == 0 {
            return fail("repeat count must be at least 1");
        }
        if self.round_trips == 0 {
            return fail("round trip count must be at least 1");
        }
        if self.kernels.contains(&KernelKind::SendModes) && self.modes.is_empty() {
            return fail("send-mode kernel selected without any modes");
        }
        Ok(())
    }
}
