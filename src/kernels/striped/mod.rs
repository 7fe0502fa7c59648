//! # Striped matrix multiplication
//!
//! `C = A * B` for square operands of order `n` on `P` ranks:
//!
//! 1. `B` is broadcast whole to every rank
//! 2. `A` is scattered in contiguous row stripes (`n mod P` leading stripes
//!    get one extra row)
//! 3. each rank computes its stripe of `C`
//! 4. the root gathers the stripes and places each one at the rows it was
//!    scattered from
//!
//! Works for any `P >= 1`; ranks whose stripe is empty still take part in
//! every collective.

#[cfg(test)]
pub mod test;

use super::{check_square_operands, into_matrix, ROOT};
use crate::comm::{Comm, Role};
use crate::error::{BenchError, Result};
use crate::matrix::Matrix;
use crate::partition::StripedPartition;

/// Multiply the root's operands; returns the product on the root only.
pub fn striped_multiply<C: Comm>(
    group: &C,
    operands: Option<(&Matrix, &Matrix)>,
    order: usize,
) -> Result<Option<Matrix>> {
    let partition = StripedPartition::new(order, group.size())?;
    let role = group.role(ROOT);

    let (a, mut b_data) = match role {
        Role::Root => {
            let (a, b) = operands.ok_or(BenchError::MissingRootData)?;
            check_square_operands(a, b, order)?;
            (Some(a), b.as_slice().to_vec())
        }
        _ => (None, Vec::new()),
    };
    group.broadcast(&mut b_data, ROOT)?;
    let b = into_matrix(b_data, order, order)?;

    let stripe = group.scatterv(a.map(Matrix::as_slice), &partition.scaled_counts(order), ROOT)?;
    let rows = partition.count(group.rank());
    let c_stripe = into_matrix(stripe, rows, order)?.matmul(&b);
    tracing::trace!(rank = group.rank(), rows, "stripe product computed");

    let Some(pieces) = group.gatherv(c_stripe.as_slice(), ROOT)? else {
        return Ok(None);
    };
    let mut c = Matrix::square(order);
    for (rank, piece) in pieces.into_iter().enumerate() {
        let range = partition.range(rank);
        let stripe = into_matrix(piece, range.len(), order)?;
        c.set_block(range.start, 0, &stripe);
    }
    Ok(Some(c))
}
