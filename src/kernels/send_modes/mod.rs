//! # Send-mode comparison
//!
//! The root distributes a full `n x n` matrix to every other rank with one
//! of the four send semantics, and the transfer alone is timed between two
//! barriers. Mode-specific preparation happens before the opening barrier:
//!
//! - `Ready`: receivers post their receive first, so the root's send is
//!   guaranteed to find it
//! - `Buffered`: the root attaches `(payload + BSEND_OVERHEAD) * (P - 1)`
//!   bytes and detaches them once the closing barrier has passed
//!
//! `send_mode_multiply` embeds that transfer in a full striped product.

#[cfg(test)]
pub mod test;

use super::{check_square_operands, into_matrix, ROOT};
use crate::comm::{Comm, Role, SendMode, Tag, BSEND_OVERHEAD};
use crate::error::{BenchError, Result};
use crate::matrix::Matrix;
use crate::partition::StripedPartition;
use std::time::{Duration, Instant};

const TAG_B: Tag = 20;

/// Buffer a root needs to buffered-send `payload_bytes` to `processes - 1` ranks
pub fn buffer_requirement(payload_bytes: usize, processes: usize) -> usize {
    (payload_bytes + BSEND_OVERHEAD) * processes.saturating_sub(1)
}

/// Copy the root's `matrix` into every other rank's `matrix` using `mode`.
///
/// Every rank passes a matrix of the same shape; non-root contents are
/// overwritten. Returns the barrier-to-barrier duration of the transfer.
pub fn distribute_timed<C: Comm>(group: &C, matrix: &mut Matrix, mode: SendMode) -> Result<Duration> {
    let role = group.role(ROOT);
    let payload_bytes = std::mem::size_of_val(matrix.as_slice());

    if mode == SendMode::Buffered && role == Role::Root {
        group.attach_buffer(vec![0u8; buffer_requirement(payload_bytes, group.size())])?;
    }

    let start = match (mode, role) {
        (SendMode::Ready, Role::Participant) => {
            // the receive is posted before the opening barrier
            group.recv_posted_into(matrix.as_mut_slice(), ROOT, TAG_B, || {
                group.barrier()?;
                Ok(Instant::now())
            })?
        }
        (_, Role::Root) => {
            group.barrier()?;
            let start = Instant::now();
            for dest in (0..group.size()).filter(|&r| r != ROOT) {
                group.send(matrix.as_slice(), dest, TAG_B, mode)?;
            }
            start
        }
        _ => {
            group.barrier()?;
            let start = Instant::now();
            group.recv_into(matrix.as_mut_slice(), ROOT, TAG_B)?;
            start
        }
    };
    group.barrier()?;
    let elapsed = start.elapsed();

    if mode == SendMode::Buffered && role == Role::Root {
        group.detach_buffer()?;
    }
    tracing::debug!(rank = group.rank(), mode = %mode, ?elapsed, "matrix distributed");
    Ok(elapsed)
}

/// Striped `C = A * B` where `B` travels with `mode`; returns the transfer
/// time in seconds on the root only.
///
/// Requires `n` divisible by `P`.
pub fn send_mode_multiply<C: Comm>(
    group: &C,
    operands: Option<(&Matrix, &Matrix)>,
    order: usize,
    mode: SendMode,
) -> Result<Option<f64>> {
    let partition = check_layout(group.size(), order)?;
    let role = group.role(ROOT);

    let (a, mut b) = match role {
        Role::Root => {
            let (a, b) = operands.ok_or(BenchError::MissingRootData)?;
            check_square_operands(a, b, order)?;
            (Some(a), b.clone())
        }
        _ => (None, Matrix::square(order)),
    };
    let transfer = distribute_timed(group, &mut b, mode)?;

    let stripe = group.scatterv(a.map(Matrix::as_slice), &partition.scaled_counts(order), ROOT)?;
    let c_stripe = into_matrix(stripe, partition.count(group.rank()), order)?.matmul(&b);
    group.gatherv(c_stripe.as_slice(), ROOT)?;

    Ok((role == Role::Root).then(|| transfer.as_secs_f64()))
}

/// Validate `(processes, order)` without communicating.
pub fn check_layout(processes: usize, order: usize) -> Result<StripedPartition> {
    let partition = StripedPartition::new(order, processes)?;
    if order % processes != 0 {
        return Err(BenchError::IndivisibleSize {
            order,
            factor: processes,
        });
    }
    Ok(partition)
}
