//! # Ping-pong latency
//!
//! Exactly two ranks bounce one message of `message_bytes` back and forth.
//! Latency is the barrier-delimited elapsed time divided by the number of
//! one-way trips.

#[cfg(test)]
pub mod test;

use super::ROOT;
use crate::comm::{Comm, Role, SendMode, Tag};
use crate::error::{BenchError, Result};
use std::time::Instant;

pub const DEFAULT_ROUND_TRIPS: usize = 100;

const TAG_PING: Tag = 30;

/// One-way latency in seconds, reported by the root only.
pub fn ping_pong<C: Comm>(group: &C, message_bytes: usize, round_trips: usize) -> Result<Option<f64>> {
    if group.size() != 2 {
        return Err(BenchError::WrongProcessCount {
            expected: 2,
            actual: group.size(),
        });
    }
    if round_trips == 0 {
        return Err(BenchError::InvalidConfig(
            "ping-pong needs at least one round trip".to_string(),
        ));
    }
    let (role, partner) = match group.role(ROOT) {
        Role::Root => (Role::Root, 1),
        _ => (Role::Peer, ROOT),
    };
    let mut message = vec![1u8; message_bytes];

    group.barrier()?;
    let start = Instant::now();
    for _ in 0..round_trips {
        match role {
            Role::Root => {
                group.send(&message, partner, TAG_PING, SendMode::Standard)?;
                group.recv_into(&mut message, partner, TAG_PING)?;
            }
            _ => {
                group.recv_into(&mut message, partner, TAG_PING)?;
                group.send(&message, partner, TAG_PING, SendMode::Standard)?;
            }
        }
    }
    group.barrier()?;
    let elapsed = start.elapsed();

    let latency = elapsed.as_secs_f64() / (2 * round_trips) as f64;
    tracing::debug!(rank = group.rank(), message_bytes, round_trips, latency, "ping-pong done");
    Ok((role == Role::Root).then_some(latency))
}
