//! Square process grids for the Fox algorithm.

use crate::comm::Comm;
use crate::error::{BenchError, Result};

/// A `p x p` arrangement of the ranks of a group, seen from one rank.
///
/// Rank `r` sits at `(r / p, r mod p)`. The row group holds the ranks sharing
/// this rank's row and the column group those sharing its column; both keep
/// ascending world order, so a rank's position in its row group is its column
/// and its position in its column group is its row.
pub struct GridTopology<C> {
    dim: usize,
    row: usize,
    col: usize,
    row_group: C,
    col_group: C,
}

/// Grid side for `processes` ranks; fails unless it is a perfect square.
pub fn grid_dimension(processes: usize) -> Result<usize> {
    let dim = integer_sqrt(processes);
    if processes == 0 || dim * dim != processes {
        return Err(BenchError::InvalidTopology { processes, dim });
    }
    Ok(dim)
}

impl<C: Comm> GridTopology<C> {
    /// Build the grid over `group`. Collective: every member must call it.
    pub fn new(group: &C) -> Result<Self> {
        let dim = grid_dimension(group.size())?;
        let row = group.rank() / dim;
        let col = group.rank() % dim;
        let row_group = group.split(row, group.rank())?;
        let col_group = group.split(col, group.rank())?;
        tracing::trace!(rank = group.rank(), row, col, "grid coordinates assigned");
        Ok(Self {
            dim,
            row,
            col,
            row_group,
            col_group,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// `(row, col)` of this rank
    pub fn coords(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn row_group(&self) -> &C {
        &self.row_group
    }

    pub fn col_group(&self) -> &C {
        &self.col_group
    }

    /// Column-group position one step up the ring (`row - 1 mod p`)
    pub fn up(&self) -> usize {
        (self.row + self.dim - 1) % self.dim
    }

    /// Column-group position one step down the ring (`row + 1 mod p`)
    pub fn down(&self) -> usize {
        (self.row + 1) % self.dim
    }
}

fn integer_sqrt(n: usize) -> usize {
    let mut root = (n as f64).sqrt() as usize;
    while root * root > n {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= n {
        root += 1;
    }
    root
}
