//! Error taxonomy shared by the runtime, the kernels and the sweep runner.

use crate::comm::Rank;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, BenchError>;

/// Everything that can go wrong while setting up or running a kernel
#[derive(Debug, Error)]
pub enum BenchError {
    /// Process count cannot be arranged as a square grid
    #[error("process count {processes} is not a perfect square (nearest grid is {dim}x{dim})")]
    InvalidTopology { processes: usize, dim: usize },

    /// Problem order does not split into whole blocks
    #[error("matrix order {order} is not divisible by partition factor {factor}")]
    IndivisibleSize { order: usize, factor: usize },

    /// Fixed-arity kernel launched on a group of the wrong size
    #[error("kernel requires exactly {expected} processes, got {actual}")]
    WrongProcessCount { expected: usize, actual: usize },

    /// Unknown send-mode name
    #[error("unsupported send mode '{0}' (expected standard, synchronous, ready or buffered)")]
    UnsupportedMode(String),

    /// A communication contract was broken by the caller
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// Problem order of zero
    #[error("problem size must be at least 1")]
    EmptyProblem,

    /// Invalid run configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Buffered send without an attached buffer
    #[error("buffered send issued with no attached buffer")]
    BufferNotAttached,

    /// Attached buffer cannot hold another message
    #[error("attached buffer exhausted: need {needed} bytes, {available} available")]
    BufferExhausted { needed: usize, available: usize },

    /// Detach requested while buffered messages are still undelivered
    #[error("cannot detach buffer: {outstanding} buffered message(s) still in flight")]
    BufferInUse { outstanding: usize },

    /// Receive buffer length does not match the incoming message
    #[error("message length mismatch: expected {expected} elements, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Incoming payload has a different element type than the receive
    #[error("message type mismatch on tag {tag} from rank {peer}")]
    TypeMismatch { peer: Rank, tag: u32 },

    /// The root rank was called without its input operands
    #[error("root rank requires input data")]
    MissingRootData,

    /// Rank outside the group
    #[error("rank {rank} is out of range for group of size {size}")]
    InvalidRank { rank: Rank, size: usize },

    /// Another rank failed and the universe was torn down
    #[error("process group aborted by a failing rank")]
    Aborted,

    /// A rank thread panicked
    #[error("rank {rank} panicked: {message}")]
    RankPanicked { rank: Rank, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    /// Errors every rank detects identically before communicating.
    ///
    /// The sweep runner skips the offending combination on these and keeps going.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BenchError::InvalidTopology { .. }
                | BenchError::IndivisibleSize { .. }
                | BenchError::WrongProcessCount { .. }
                | BenchError::UnsupportedMode(_)
                | BenchError::EmptyProblem
        )
    }
}
