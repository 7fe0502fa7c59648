//! # Distributed kernels
//!
//! Every kernel is an SPMD routine generic over the communicator: all ranks
//! of a group call it with the same scalar arguments, and only the root
//! passes the operands. Preconditions are checked before the first message is
//! sent, so a rejected configuration fails identically on every rank.

pub mod balance;
pub mod fox;
pub mod ping_pong;
pub mod reduce;
pub mod send_modes;
pub mod striped;

use crate::comm::Rank;
use crate::error::{BenchError, Result};
use crate::matrix::Matrix;

/// Rank that owns operands and assembled results
pub const ROOT: Rank = 0;

/// Root-side check that both operands are `order x order`.
pub(crate) fn check_square_operands(a: &Matrix, b: &Matrix, order: usize) -> Result<()> {
    for m in [a, b] {
        if m.rows() != order || m.cols() != order {
            return Err(BenchError::LengthMismatch {
                expected: order * order,
                actual: m.rows() * m.cols(),
            });
        }
    }
    Ok(())
}

/// Reinterpret a received payload as a `rows x cols` matrix.
pub(crate) fn into_matrix(data: Vec<f64>, rows: usize, cols: usize) -> Result<Matrix> {
    let actual = data.len();
    Matrix::from_vec(rows, cols, data).ok_or(BenchError::LengthMismatch {
        expected: rows * cols,
        actual,
    })
}
