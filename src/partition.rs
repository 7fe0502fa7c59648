//! Splitting a problem of order `n` into per-rank pieces.
//!
//! Both policies validate their inputs before any communication happens, so
//! every rank that builds the same partition sees the same error.

use crate::error::{BenchError, Result};
use std::ops::Range;

/// Contiguous row stripes, the first `n mod parts` stripes one row taller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StripedPartition {
    counts: Vec<usize>,
    offsets: Vec<usize>,
}

impl StripedPartition {
    pub fn new(order: usize, parts: usize) -> Result<Self> {
        if order == 0 {
            return Err(BenchError::EmptyProblem);
        }
        if parts == 0 {
            return Err(BenchError::InvalidTopology {
                processes: 0,
                dim: 0,
            });
        }
        let base = order / parts;
        let extra = order % parts;
        let counts: Vec<usize> = (0..parts)
            .map(|r| base + usize::from(r < extra))
            .collect();
        let offsets = counts
            .iter()
            .scan(0, |acc, &count| {
                let start = *acc;
                *acc += count;
                Some(start)
            })
            .collect();
        Ok(Self { counts, offsets })
    }

    pub fn parts(&self) -> usize {
        self.counts.len()
    }

    pub fn count(&self, part: usize) -> usize {
        self.counts[part]
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Rows owned by `part`
    pub fn range(&self, part: usize) -> Range<usize> {
        self.offsets[part]..self.offsets[part] + self.counts[part]
    }

    /// Element counts when every row carries `width` values
    pub fn scaled_counts(&self, width: usize) -> Vec<usize> {
        self.counts.iter().map(|c| c * width).collect()
    }
}

/// `p x p` square blocks of side `n / p`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockPartition {
    order: usize,
    grid: usize,
    block: usize,
}

impl BlockPartition {
    pub fn new(order: usize, grid: usize) -> Result<Self> {
        if order == 0 {
            return Err(BenchError::EmptyProblem);
        }
        if grid == 0 {
            return Err(BenchError::InvalidTopology {
                processes: 0,
                dim: 0,
            });
        }
        if order % grid != 0 {
            return Err(BenchError::IndivisibleSize {
                order,
                factor: grid,
            });
        }
        Ok(Self {
            order,
            grid,
            block: order / grid,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn grid(&self) -> usize {
        self.grid
    }

    /// Side length of one block
    pub fn block_size(&self) -> usize {
        self.block
    }

    /// Row and column ranges covered by grid cell `(row, col)`
    pub fn cell(&self, row: usize, col: usize) -> (Range<usize>, Range<usize>) {
        (
            row * self.block..(row + 1) * self.block,
            col * self.block..(col + 1) * self.block,
        )
    }

    /// Rank owning cell `(row, col)`
    pub fn owner(&self, row: usize, col: usize) -> usize {
        row * self.grid + col
    }

    /// Cell owned by `rank`
    pub fn coords_of(&self, rank: usize) -> (usize, usize) {
        (rank / self.grid, rank % self.grid)
    }
}
