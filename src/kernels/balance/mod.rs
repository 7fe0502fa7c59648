//! # Compute/communication balance
//!
//! Each rank runs a synthetic floating-point loop, then exchanges a message
//! with its ring neighbours for a fixed number of rounds. Comparing the total
//! against the pure compute time shows how much the exchange costs at a given
//! process count.

#[cfg(test)]
pub mod test;

use super::ROOT;
use crate::comm::{Comm, Role, Tag};
use crate::error::Result;
use std::hint::black_box;
use std::time::Instant;

pub const DEFAULT_COMM_ROUNDS: usize = 10;
pub const DEFAULT_COMPUTE_ITERS: usize = 100_000;

const TAG_RING: Tag = 40;

/// Busy loop of `iterations` dependent floating-point updates.
pub fn synthetic_compute(iterations: usize) -> f64 {
    let mut acc = 0.0f64;
    for i in 0..iterations {
        acc = black_box(acc + (i as f64) * 1e-6);
    }
    acc
}

/// Send to `rank + 1` and receive from `rank - 1` (mod `P`), `rounds` times.
pub fn ring_exchange<C: Comm>(group: &C, message_bytes: usize, rounds: usize) -> Result<()> {
    let size = group.size();
    let next = (group.rank() + 1) % size;
    let prev = (group.rank() + size - 1) % size;
    let outgoing = vec![1u8; message_bytes];
    let mut incoming = vec![0u8; message_bytes];
    for _ in 0..rounds {
        group.sendrecv_into(&outgoing, next, &mut incoming, prev, TAG_RING)?;
    }
    Ok(())
}

/// Total compute-plus-exchange time in seconds, reported by the root only.
pub fn compute_comm_balance<C: Comm>(
    group: &C,
    compute_iters: usize,
    message_bytes: usize,
    rounds: usize,
) -> Result<Option<f64>> {
    group.barrier()?;
    let start = Instant::now();
    black_box(synthetic_compute(compute_iters));
    ring_exchange(group, message_bytes, rounds)?;
    group.barrier()?;
    let elapsed = start.elapsed().as_secs_f64();
    Ok((group.role(ROOT) == Role::Root).then_some(elapsed))
}
