//! # Global reductions
//!
//! Both kernels follow the same pattern: the root's vector is scattered in
//! contiguous stripes, each rank reduces its stripe locally, and a single
//! all-reduce combines the partial results so that every rank ends up with
//! the identical value.
//!
//! - `global_extremum`: min or max of one vector
//! - `distributed_dot`: `Σ a[i] * b[i]` over two vectors

#[cfg(test)]
pub mod test;

use super::ROOT;
use crate::comm::{Comm, ReduceOp};
use crate::error::Result;
use crate::partition::StripedPartition;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Direction of an extremum search
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Min,
    Max,
}

impl Aggregate {
    pub fn from_find_min(find_min: bool) -> Self {
        if find_min {
            Aggregate::Min
        } else {
            Aggregate::Max
        }
    }

    pub fn op(self) -> ReduceOp {
        match self {
            Aggregate::Min => ReduceOp::Min,
            Aggregate::Max => ReduceOp::Max,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }
}

/// Uniform values in `[low, high)`
pub fn random_vector<R: Rng>(len: usize, low: f64, high: f64, rng: &mut R) -> Vec<f64> {
    (0..len).map(|_| rng.random_range(low..high)).collect()
}

/// Min or max of the root's `order`-element vector, available on every rank.
///
/// Ranks whose stripe is empty (`order < P`) contribute the operator identity.
pub fn global_extremum<C: Comm>(
    group: &C,
    data: Option<&[f64]>,
    order: usize,
    aggregate: Aggregate,
) -> Result<f64> {
    let partition = StripedPartition::new(order, group.size())?;
    let local = group.scatterv(data, partition.counts(), ROOT)?;
    let op = aggregate.op();
    let partial = local.iter().fold(op.identity(), |acc, &v| op.apply(acc, v));
    group.all_reduce(partial, op)
}

/// Dot product of the root's two `order`-element vectors, available on every rank.
pub fn distributed_dot<C: Comm>(
    group: &C,
    a: Option<&[f64]>,
    b: Option<&[f64]>,
    order: usize,
) -> Result<f64> {
    let partition = StripedPartition::new(order, group.size())?;
    let local_a = group.scatterv(a, partition.counts(), ROOT)?;
    let local_b = group.scatterv(b, partition.counts(), ROOT)?;
    let partial: f64 = local_a.iter().zip(&local_b).map(|(x, y)| x * y).sum();
    tracing::trace!(rank = group.rank(), partial, "local dot product");
    group.all_reduce(partial, ReduceOp::Sum)
}
