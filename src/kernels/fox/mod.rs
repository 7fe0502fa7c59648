//! # Fox block matrix multiplication
//!
//! Runs on a `p x p` grid of ranks (`P = p²`) with operands of order `n`,
//! where `p` divides `n`. Rank `(i, j)` owns blocks `A_ij`, `B_ij` and
//! accumulates `C_ij`.
//!
//! At stage `k` the rank in column `(i + k) mod p` of each grid row
//! broadcasts its `A` block along the row; every rank adds the product of
//! that pivot block with its current `B` block, then passes `B` one step up
//! its grid column. After `p` stages
//! `C_ij = Σ_k A_{i,(i+k) mod p} * B_{(i+k) mod p, j}`.

#[cfg(test)]
pub mod test;

use super::{check_square_operands, into_matrix, ROOT};
use crate::comm::{Comm, Role, SendMode, Tag};
use crate::error::{BenchError, Result};
use crate::matrix::Matrix;
use crate::partition::BlockPartition;
use crate::topology::{grid_dimension, GridTopology};

const TAG_A: Tag = 10;
const TAG_B: Tag = 11;
const TAG_C: Tag = 12;
const TAG_SHIFT: Tag = 13;

/// Validate `(processes, order)` without communicating.
pub fn check_layout(processes: usize, order: usize) -> Result<BlockPartition> {
    let dim = grid_dimension(processes)?;
    BlockPartition::new(order, dim)
}

/// Multiply the root's operands on a square grid; returns the product on the root only.
pub fn fox_multiply<C: Comm>(
    group: &C,
    operands: Option<(&Matrix, &Matrix)>,
    order: usize,
) -> Result<Option<Matrix>> {
    let blocks = check_layout(group.size(), order)?;
    let grid = GridTopology::new(group)?;
    let (row, col) = grid.coords();
    let dim = grid.dim();
    let side = blocks.block_size();
    let role = group.role(ROOT);

    let (a_block, mut b_block) = match role {
        Role::Root => {
            let (a, b) = operands.ok_or(BenchError::MissingRootData)?;
            check_square_operands(a, b, order)?;
            distribute_blocks(group, &blocks, a, b)?
        }
        _ => {
            let a = group.recv(ROOT, TAG_A)?;
            let b = group.recv(ROOT, TAG_B)?;
            (into_matrix(a, side, side)?, into_matrix(b, side, side)?)
        }
    };

    let mut c_block = Matrix::square(side);
    for stage in 0..dim {
        let pivot_col = (row + stage) % dim;
        let mut pivot = if col == pivot_col {
            a_block.as_slice().to_vec()
        } else {
            Vec::new()
        };
        grid.row_group().broadcast(&mut pivot, pivot_col)?;
        c_block.mul_add(&into_matrix(pivot, side, side)?, &b_block);

        grid.col_group()
            .sendrecv_replace(b_block.as_mut_slice(), grid.up(), grid.down(), TAG_SHIFT)?;
        tracing::trace!(rank = group.rank(), stage, pivot_col, "fox stage done");
    }

    match role {
        Role::Root => {
            let mut c = Matrix::square(order);
            let (rows, cols) = blocks.cell(row, col);
            c.set_block(rows.start, cols.start, &c_block);
            for rank in (0..group.size()).filter(|&r| r != ROOT) {
                let (r, k) = blocks.coords_of(rank);
                let (rows, cols) = blocks.cell(r, k);
                let block = into_matrix(group.recv(rank, TAG_C)?, side, side)?;
                c.set_block(rows.start, cols.start, &block);
            }
            Ok(Some(c))
        }
        _ => {
            group.send(c_block.as_slice(), ROOT, TAG_C, SendMode::Standard)?;
            Ok(None)
        }
    }
}

/// Send `(A_ij, B_ij)` to every rank and keep the root's own pair.
fn distribute_blocks<C: Comm>(
    group: &C,
    blocks: &BlockPartition,
    a: &Matrix,
    b: &Matrix,
) -> Result<(Matrix, Matrix)> {
    let mut own = None;
    for rank in 0..group.size() {
        let (row, col) = blocks.coords_of(rank);
        let (rows, cols) = blocks.cell(row, col);
        let a_block = a.block(rows.clone(), cols.clone());
        let b_block = b.block(rows, cols);
        if rank == ROOT {
            own = Some((a_block, b_block));
        } else {
            group.send(a_block.as_slice(), rank, TAG_A, SendMode::Standard)?;
            group.send(b_block.as_slice(), rank, TAG_B, SendMode::Standard)?;
        }
    }
    own.ok_or(BenchError::MissingRootData)
}
