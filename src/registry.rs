//! Kernel registry.
//!
//! The set of kernels is closed: [`KernelKind`] names them for configuration
//! and listing, and [`Kernel`] carries the fixed parameters of one runnable
//! variant. The runner only ever goes through this interface.

use crate::comm::{Comm, SendMode};
use crate::config::BenchConfig;
use crate::error::{BenchError, Result};
use crate::kernels::reduce::{self, Aggregate};
use crate::kernels::{balance, fox, ping_pong, send_modes, striped, ROOT};
use crate::matrix::Matrix;
use crate::partition::StripedPartition;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Kernel names as they appear in configuration and output
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    MinMax,
    Dot,
    PingPong,
    StripedMultiply,
    FoxMultiply,
    SendModes,
    ComputeCommBalance,
}

impl KernelKind {
    pub const ALL: [KernelKind; 7] = [
        KernelKind::MinMax,
        KernelKind::Dot,
        KernelKind::PingPong,
        KernelKind::StripedMultiply,
        KernelKind::FoxMultiply,
        KernelKind::SendModes,
        KernelKind::ComputeCommBalance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            KernelKind::MinMax => "min_max",
            KernelKind::Dot => "dot",
            KernelKind::PingPong => "ping_pong",
            KernelKind::StripedMultiply => "striped_multiply",
            KernelKind::FoxMultiply => "fox_multiply",
            KernelKind::SendModes => "send_modes",
            KernelKind::ComputeCommBalance => "compute_comm_balance",
        }
    }

    pub fn category(self) -> &'static str {
        match self {
            KernelKind::MinMax | KernelKind::Dot => "reduction",
            KernelKind::StripedMultiply | KernelKind::FoxMultiply => "matmul",
            KernelKind::PingPong | KernelKind::SendModes => "transfer",
            KernelKind::ComputeCommBalance => "balance",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            KernelKind::MinMax => "Global min/max of a striped vector via all-reduce",
            KernelKind::Dot => "Dot product of two striped vectors via all-reduce",
            KernelKind::PingPong => "Two-rank round-trip latency for a fixed message size",
            KernelKind::StripedMultiply => "Matrix product with broadcast B and row stripes of A",
            KernelKind::FoxMultiply => "Fox block matrix product on a square process grid",
            KernelKind::SendModes => "Matrix distribution under the four send modes",
            KernelKind::ComputeCommBalance => "Synthetic compute followed by ring exchanges",
        }
    }

    /// What the `size` column means for this kernel
    pub fn size_unit(self) -> &'static str {
        match self {
            KernelKind::MinMax | KernelKind::Dot => "elements",
            KernelKind::StripedMultiply | KernelKind::FoxMultiply | KernelKind::SendModes => "order",
            KernelKind::PingPong => "bytes",
            KernelKind::ComputeCommBalance => "iterations",
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KernelKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        KernelKind::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| BenchError::InvalidConfig(format!("unknown kernel '{}'", s)))
    }
}

/// One runnable kernel variant with its fixed parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Kernel {
    MinMax { aggregate: Aggregate },
    Dot,
    PingPong { message_bytes: usize, round_trips: usize },
    StripedMultiply,
    FoxMultiply,
    SendModes { mode: SendMode },
    ComputeCommBalance { compute_iters: usize, message_bytes: usize, rounds: usize },
}

/// Root-side inputs, generated before any timing starts
#[derive(Clone, Debug, Default)]
pub enum Workload {
    /// Non-root ranks, and kernels without operands
    #[default]
    Empty,
    Vector(Vec<f64>),
    Vectors(Vec<f64>, Vec<f64>),
    Matrices(Matrix, Matrix),
}

impl Workload {
    fn vector(&self) -> Option<&[f64]> {
        match self {
            Workload::Vector(v) => Some(v),
            _ => None,
        }
    }

    fn vectors(&self) -> (Option<&[f64]>, Option<&[f64]>) {
        match self {
            Workload::Vectors(a, b) => (Some(a), Some(b)),
            _ => (None, None),
        }
    }

    fn matrices(&self) -> Option<(&Matrix, &Matrix)> {
        match self {
            Workload::Matrices(a, b) => Some((a, b)),
            _ => None,
        }
    }
}

/// What one execution of a kernel produced
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Outcome {
    /// Functional value, where the kernel has one
    pub value: Option<f64>,
    /// Time the kernel measured itself; replaces the harness window when present
    pub own_time: Option<Duration>,
}

impl Outcome {
    fn value(value: Option<f64>) -> Self {
        Self {
            value,
            own_time: None,
        }
    }
}

impl Kernel {
    pub fn kind(&self) -> KernelKind {
        match self {
            Kernel::MinMax { .. } => KernelKind::MinMax,
            Kernel::Dot => KernelKind::Dot,
            Kernel::PingPong { .. } => KernelKind::PingPong,
            Kernel::StripedMultiply => KernelKind::StripedMultiply,
            Kernel::FoxMultiply => KernelKind::FoxMultiply,
            Kernel::SendModes { .. } => KernelKind::SendModes,
            Kernel::ComputeCommBalance { .. } => KernelKind::ComputeCommBalance,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Label distinguishing variants of the same kernel
    pub fn variant(&self) -> String {
        match self {
            Kernel::MinMax { aggregate } => aggregate.name().to_string(),
            Kernel::SendModes { mode } => mode.name().to_string(),
            _ => "default".to_string(),
        }
    }

    /// Problem size for kernels whose size is a fixed parameter rather than swept
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Kernel::PingPong { message_bytes, .. } => Some(*message_bytes),
            Kernel::ComputeCommBalance { compute_iters, .. } => Some(*compute_iters),
            _ => None,
        }
    }

    /// Reject `(processes, size)` without communicating.
    pub fn check(&self, processes: usize, size: usize) -> Result<()> {
        match self {
            Kernel::MinMax { .. } | Kernel::Dot | Kernel::StripedMultiply => {
                StripedPartition::new(size, processes).map(drop)
            }
            Kernel::FoxMultiply => fox::check_layout(processes, size).map(drop),
            Kernel::SendModes { .. } => send_modes::check_layout(processes, size).map(drop),
            Kernel::PingPong { .. } if processes != 2 => Err(BenchError::WrongProcessCount {
                expected: 2,
                actual: processes,
            }),
            Kernel::PingPong { .. } | Kernel::ComputeCommBalance { .. } => Ok(()),
        }
    }

    /// Generate the root's inputs for `size` from `seed`; other ranks get `Empty`.
    pub fn prepare<C: Comm>(&self, group: &C, size: usize, seed: u64) -> Workload {
        if group.rank() != ROOT {
            return Workload::Empty;
        }
        let mut rng = StdRng::seed_from_u64(seed);
        match self {
            Kernel::MinMax { .. } => Workload::Vector(reduce::random_vector(size, -100.0, 100.0, &mut rng)),
            Kernel::Dot => Workload::Vectors(
                reduce::random_vector(size, 0.0, 1.0, &mut rng),
                reduce::random_vector(size, 0.0, 1.0, &mut rng),
            ),
            Kernel::StripedMultiply | Kernel::FoxMultiply | Kernel::SendModes { .. } => Workload::Matrices(
                Matrix::random(size, size, &mut rng),
                Matrix::random(size, size, &mut rng),
            ),
            Kernel::PingPong { .. } | Kernel::ComputeCommBalance { .. } => Workload::Empty,
        }
    }

    /// Run once; returns the functional value where the kernel has one.
    ///
    /// Products are reported by their checksum and the send-mode kernel by
    /// its transfer time. Ping-pong has no value; its one-way latency comes
    /// back as the kernel's own time on the root.
    pub fn execute<C: Comm>(&self, group: &C, workload: &Workload, size: usize) -> Result<Outcome> {
        match *self {
            Kernel::MinMax { aggregate } => {
                reduce::global_extremum(group, workload.vector(), size, aggregate).map(|v| Outcome::value(Some(v)))
            }
            Kernel::Dot => {
                let (a, b) = workload.vectors();
                reduce::distributed_dot(group, a, b, size).map(|v| Outcome::value(Some(v)))
            }
            Kernel::PingPong {
                message_bytes,
                round_trips,
            } => {
                let latency = ping_pong::ping_pong(group, message_bytes, round_trips)?;
                Ok(Outcome {
                    value: None,
                    own_time: latency.map(Duration::from_secs_f64),
                })
            }
            Kernel::StripedMultiply => {
                let c = striped::striped_multiply(group, workload.matrices(), size)?;
                Ok(Outcome::value(c.map(|c| c.checksum())))
            }
            Kernel::FoxMultiply => {
                let c = fox::fox_multiply(group, workload.matrices(), size)?;
                Ok(Outcome::value(c.map(|c| c.checksum())))
            }
            Kernel::SendModes { mode } => {
                send_modes::send_mode_multiply(group, workload.matrices(), size, mode).map(Outcome::value)
            }
            Kernel::ComputeCommBalance {
                compute_iters,
                message_bytes,
                rounds,
            } => balance::compute_comm_balance(group, compute_iters, message_bytes, rounds)
                .map(|_| Outcome::default()),
        }
    }

    /// Verify the kernel against a sequential reference on a small problem.
    pub fn verify(&self) -> std::result::Result<(), String> {
        verify::run(self).map_err(|e| format!("{}: {}", self.name(), e))
    }
}

/// Expand a configuration into kernel variants, in configuration order.
///
/// Unparseable send modes come back as `UnsupportedMode` errors in place of
/// the variant they would have produced.
pub fn kernels_for(config: &BenchConfig) -> Vec<Result<Kernel>> {
    let mut kernels = Vec::new();
    for &kind in &config.kernels {
        match kind {
            KernelKind::MinMax => kernels.push(Ok(Kernel::MinMax {
                aggregate: Aggregate::from_find_min(config.find_min),
            })),
            KernelKind::Dot => kernels.push(Ok(Kernel::Dot)),
            KernelKind::PingPong => kernels.push(Ok(Kernel::PingPong {
                message_bytes: config.message_bytes,
                round_trips: config.round_trips,
            })),
            KernelKind::StripedMultiply => kernels.push(Ok(Kernel::StripedMultiply)),
            KernelKind::FoxMultiply => kernels.push(Ok(Kernel::FoxMultiply)),
            KernelKind::SendModes => kernels.extend(
                config
                    .modes
                    .iter()
                    .map(|m| m.parse::<SendMode>().map(|mode| Kernel::SendModes { mode })),
            ),
            KernelKind::ComputeCommBalance => kernels.push(Ok(Kernel::ComputeCommBalance {
                compute_iters: config.compute_iters,
                message_bytes: config.message_bytes,
                rounds: config.comm_rounds,
            })),
        }
    }
    kernels
}

/// One variant of every kernel with default parameters
pub fn build_registry() -> Vec<Kernel> {
    let config = BenchConfig::default();
    let mut kernels: Vec<Kernel> = kernels_for(&config).into_iter().filter_map(Result::ok).collect();
    kernels.push(Kernel::MinMax {
        aggregate: Aggregate::from_find_min(!config.find_min),
    });
    kernels
}

mod verify {
    use super::*;
    use crate::comm::Universe;

    const ORDER: usize = 12;
    const SEED: u64 = 0x5eed;

    /// Run `kernel` on `processes` ranks and return the root's outcome.
    fn root_outcome(kernel: &Kernel, processes: usize, size: usize) -> Result<Outcome> {
        let outcomes = Universe::new(processes)?.run(|group| {
            let workload = kernel.prepare(&group, size, SEED);
            kernel.execute(&group, &workload, size)
        })?;
        Ok(outcomes.into_iter().next().unwrap_or_default())
    }

    fn root_value(kernel: &Kernel, processes: usize, size: usize) -> Result<Option<f64>> {
        Ok(root_outcome(kernel, processes, size)?.value)
    }

    fn expect_close(actual: Option<f64>, expected: f64) -> Result<()> {
        let actual = actual.ok_or(BenchError::MissingRootData)?;
        if (actual - expected).abs() > 1e-9 * expected.abs().max(1.0) {
            return Err(BenchError::PreconditionViolation(format!(
                "expected {}, got {}",
                expected, actual
            )));
        }
        Ok(())
    }

    /// Reference value computed from the same seeded inputs the root would use
    fn reference(kernel: &Kernel, size: usize) -> Result<f64> {
        let workload = Universe::new(1)?.run(|group| Ok(kernel.prepare(&group, size, SEED)))?;
        match (kernel, workload.into_iter().next().unwrap_or_default()) {
            (Kernel::MinMax { aggregate }, Workload::Vector(v)) => {
                let op = aggregate.op();
                Ok(v.iter().fold(op.identity(), |acc, &x| op.apply(acc, x)))
            }
            (Kernel::Dot, Workload::Vectors(a, b)) => Ok(a.iter().zip(&b).map(|(x, y)| x * y).sum()),
            (_, Workload::Matrices(a, b)) => Ok(a.matmul(&b).checksum()),
            _ => Err(BenchError::MissingRootData),
        }
    }

    pub(super) fn run(kernel: &Kernel) -> Result<()> {
        match kernel {
            Kernel::MinMax { .. } | Kernel::Dot | Kernel::StripedMultiply => {
                let expected = reference(kernel, ORDER)?;
                for processes in [1, 3, 5] {
                    expect_close(root_value(kernel, processes, ORDER)?, expected)?;
                }
            }
            Kernel::FoxMultiply => {
                let expected = reference(kernel, ORDER)?;
                for processes in [1, 4, 9] {
                    expect_close(root_value(kernel, processes, ORDER)?, expected)?;
                }
            }
            Kernel::SendModes { .. } => {
                for processes in [2, 4] {
                    let transfer = root_value(kernel, processes, ORDER)?;
                    if !transfer.is_some_and(|t| t >= 0.0) {
                        return Err(BenchError::MissingRootData);
                    }
                }
            }
            Kernel::PingPong { .. } => {
                kernel.check(2, 0)?;
                let outcome = root_outcome(kernel, 2, 0)?;
                if outcome.value.is_some() || !outcome.own_time.is_some_and(|t| t > Duration::ZERO) {
                    return Err(BenchError::MissingRootData);
                }
            }
            Kernel::ComputeCommBalance { .. } => {
                root_value(kernel, 3, 0)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in KernelKind::ALL {
            assert_eq!(kind.name().parse::<KernelKind>().unwrap(), kind);
        }
        assert_eq!("Fox-Multiply".parse::<KernelKind>().unwrap(), KernelKind::FoxMultiply);
        assert!("cannon".parse::<KernelKind>().is_err());
    }

    #[test]
    fn test_kernels_for_expands_modes() {
        let mut config = BenchConfig::default();
        config.kernels = vec![KernelKind::SendModes];
        config.modes = vec!["send".into(), "bogus".into(), "bsend".into()];
        let kernels = kernels_for(&config);
        assert_eq!(kernels.len(), 3);
        assert!(matches!(kernels[0], Ok(Kernel::SendModes { mode: SendMode::Standard })));
        assert!(matches!(kernels[1], Err(BenchError::UnsupportedMode(_))));
        assert!(matches!(kernels[2], Ok(Kernel::SendModes { mode: SendMode::Buffered })));
    }

    #[test]
    fn test_checks_match_kernel_preconditions() {
        assert!(Kernel::FoxMultiply.check(4, 8).is_ok());
        assert!(matches!(
            Kernel::FoxMultiply.check(6, 12),
            Err(BenchError::InvalidTopology { .. })
        ));
        assert!(matches!(
            Kernel::FoxMultiply.check(9, 10),
            Err(BenchError::IndivisibleSize { order: 10, factor: 3 })
        ));
        assert!(Kernel::FoxMultiply.check(9, 9).is_ok());
        let ping = Kernel::PingPong {
            message_bytes: 8,
            round_trips: 1,
        };
        assert!(matches!(ping.check(3, 8), Err(BenchError::WrongProcessCount { .. })));
        assert!(Kernel::StripedMultiply.check(7, 3).is_ok());
        assert!(matches!(Kernel::Dot.check(2, 0), Err(BenchError::EmptyProblem)));
    }

    #[test]
    fn test_fixed_sizes() {
        let ping = Kernel::PingPong {
            message_bytes: 512,
            round_trips: 10,
        };
        assert_eq!(ping.fixed_size(), Some(512));
        assert_eq!(Kernel::Dot.fixed_size(), None);
    }

    #[test]
    fn test_registry_covers_every_kind() {
        let registry = build_registry();
        for kind in KernelKind::ALL {
            assert!(registry.iter().any(|k| k.kind() == kind), "missing {}", kind);
        }
        assert_eq!(
            registry.iter().filter(|k| k.kind() == KernelKind::SendModes).count(),
            SendMode::ALL.len()
        );
    }
}
