//! Collective operations built on point-to-point traffic.
//!
//! Collectives run on a context of their own (the group context with the top
//! bit set) so they never match user messages. Every member must call the same
//! collectives in the same order.

use super::communicator::Element;
use super::group::ProcessGroup;
use super::{ContextId, Rank, Role, SendMode, Tag};
use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const COLLECTIVE_BIT: ContextId = 1 << 63;

const TAG_BARRIER: Tag = 1;
const TAG_BCAST: Tag = 2;
const TAG_SCATTER: Tag = 3;
const TAG_GATHER: Tag = 4;
const TAG_ALLGATHER: Tag = 5;

/// Combining operator of a reduction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    /// Neutral element of the operator
    pub fn identity(self) -> f64 {
        match self {
            ReduceOp::Sum => 0.0,
            ReduceOp::Min => f64::INFINITY,
            ReduceOp::Max => f64::NEG_INFINITY,
        }
    }

    pub fn apply(self, acc: f64, value: f64) -> f64 {
        match self {
            ReduceOp::Sum => acc + value,
            ReduceOp::Min => acc.min(value),
            ReduceOp::Max => acc.max(value),
        }
    }
}

impl ProcessGroup {
    fn collective_context(&self) -> ContextId {
        self.context | COLLECTIVE_BIT
    }

    fn coll_send<T: Element>(&self, data: &[T], dest: Rank, tag: Tag) -> Result<()> {
        self.send_on(self.collective_context(), data, dest, tag, SendMode::Standard)
    }

    fn coll_recv<T: Element>(&self, source: Rank, tag: Tag) -> Result<Vec<T>> {
        self.recv_on(self.collective_context(), source, tag)
    }

    /// No member returns before every member has entered.
    pub fn barrier(&self) -> Result<()> {
        let empty: [u8; 0] = [];
        match self.role(0) {
            Role::Root => {
                for rank in 1..self.size() {
                    self.coll_recv::<u8>(rank, TAG_BARRIER)?;
                }
                for rank in 1..self.size() {
                    self.coll_send(&empty, rank, TAG_BARRIER)?;
                }
            }
            _ => {
                self.coll_send(&empty, 0, TAG_BARRIER)?;
                self.coll_recv::<u8>(0, TAG_BARRIER)?;
            }
        }
        Ok(())
    }

    /// Binomial-tree broadcast; non-root contents are replaced by the root's.
    pub fn broadcast<T: Element>(&self, data: &mut Vec<T>, root: Rank) -> Result<()> {
        self.check_rank(root)?;
        let size = self.size();
        let relative = (self.rank + size - root) % size;
        let mut mask = 1;
        while mask < size {
            if relative & mask != 0 {
                let parent = (relative - mask + root) % size;
                *data = self.coll_recv(parent, TAG_BCAST)?;
                break;
            }
            mask <<= 1;
        }
        mask >>= 1;
        while mask > 0 {
            if relative + mask < size {
                let child = (relative + mask + root) % size;
                self.coll_send(data, child, TAG_BCAST)?;
            }
            mask >>= 1;
        }
        Ok(())
    }

    /// Split `send` (root only) into consecutive pieces of `counts[r]` elements.
    pub fn scatterv<T: Element>(
        &self,
        send: Option<&[T]>,
        counts: &[usize],
        root: Rank,
    ) -> Result<Vec<T>> {
        self.check_rank(root)?;
        if counts.len() != self.size() {
            return Err(BenchError::LengthMismatch {
                expected: self.size(),
                actual: counts.len(),
            });
        }
        match self.role(root) {
            Role::Root => {
                let send = send.ok_or(BenchError::MissingRootData)?;
                let total: usize = counts.iter().sum();
                if send.len() != total {
                    return Err(BenchError::LengthMismatch {
                        expected: total,
                        actual: send.len(),
                    });
                }
                let mut own = Vec::new();
                let mut offset = 0;
                for (rank, &count) in counts.iter().enumerate() {
                    let piece = &send[offset..offset + count];
                    if rank == root {
                        own = piece.to_vec();
                    } else {
                        self.coll_send(piece, rank, TAG_SCATTER)?;
                    }
                    offset += count;
                }
                Ok(own)
            }
            _ => {
                let piece = self.coll_recv::<T>(root, TAG_SCATTER)?;
                if piece.len() != counts[self.rank] {
                    return Err(BenchError::LengthMismatch {
                        expected: counts[self.rank],
                        actual: piece.len(),
                    });
                }
                Ok(piece)
            }
        }
    }

    /// Collect every member's piece on `root`, in rank order.
    pub fn gatherv<T: Element>(&self, local: &[T], root: Rank) -> Result<Option<Vec<Vec<T>>>> {
        self.check_rank(root)?;
        match self.role(root) {
            Role::Root => {
                let mut pieces = Vec::with_capacity(self.size());
                for rank in 0..self.size() {
                    if rank == root {
                        pieces.push(local.to_vec());
                    } else {
                        pieces.push(self.coll_recv(rank, TAG_GATHER)?);
                    }
                }
                Ok(Some(pieces))
            }
            _ => {
                self.coll_send(local, root, TAG_GATHER)?;
                Ok(None)
            }
        }
    }

    /// Every member receives every member's piece, in rank order.
    pub fn all_gather<T: Element>(&self, local: &[T]) -> Result<Vec<Vec<T>>> {
        for rank in (0..self.size()).filter(|&r| r != self.rank) {
            self.coll_send(local, rank, TAG_ALLGATHER)?;
        }
        let mut pieces = Vec::with_capacity(self.size());
        for rank in 0..self.size() {
            if rank == self.rank {
                pieces.push(local.to_vec());
            } else {
                pieces.push(self.coll_recv(rank, TAG_ALLGATHER)?);
            }
        }
        Ok(pieces)
    }

    /// Combine one value per member on `root`, folding in ascending rank order.
    pub fn reduce(&self, value: f64, op: ReduceOp, root: Rank) -> Result<Option<f64>> {
        let gathered = self.gatherv(&[value], root)?;
        Ok(gathered.map(|pieces| {
            pieces
                .iter()
                .flatten()
                .fold(op.identity(), |acc, &v| op.apply(acc, v))
        }))
    }

    /// Reduce on rank 0 and broadcast, so every member sees the identical value.
    pub fn all_reduce(&self, value: f64, op: ReduceOp) -> Result<f64> {
        let mut result: Vec<f64> = self.reduce(value, op, 0)?.into_iter().collect();
        self.broadcast(&mut result, 0)?;
        result.first().copied().ok_or(BenchError::LengthMismatch {
            expected: 1,
            actual: 0,
        })
    }

    /// Partition the group by `color`; members of a part are ordered by `(key, rank)`.
    ///
    /// Every member must call this. Rank 0 of the parent allocates the new
    /// contexts so that all parts agree on them without further negotiation.
    pub fn split(&self, color: usize, key: usize) -> Result<ProcessGroup> {
        let entries = self.all_gather(&[color, key])?;
        if let Some(bad) = entries.iter().find(|e| e.len() != 2) {
            return Err(BenchError::LengthMismatch {
                expected: 2,
                actual: bad.len(),
            });
        }
        let mut colors: Vec<usize> = entries.iter().map(|e| e[0]).collect();
        colors.sort_unstable();
        colors.dedup();

        let mut base: Vec<ContextId> = match self.role(0) {
            Role::Root => vec![self.fabric.allocate_contexts(colors.len() as u64)],
            _ => Vec::new(),
        };
        self.broadcast(&mut base, 0)?;
        let base = base.first().copied().ok_or(BenchError::LengthMismatch {
            expected: 1,
            actual: 0,
        })?;
        let color_index = colors.binary_search(&color).unwrap_or_default() as ContextId;

        let mut part: Vec<(usize, Rank)> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e[0] == color)
            .map(|(rank, e)| (e[1], rank))
            .collect();
        part.sort_unstable();
        let rank = part
            .iter()
            .position(|&(_, r)| r == self.rank)
            .unwrap_or_default();
        let members: Arc<[Rank]> = part.iter().map(|&(_, r)| self.members[r]).collect();

        Ok(ProcessGroup {
            rank,
            members,
            context: base + color_index,
            fabric: Arc::clone(&self.fabric),
            buffer: Arc::clone(&self.buffer),
        })
    }
}
