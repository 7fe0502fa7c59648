//! Barrier-delimited timing of SPMD operations.
//!
//! Each repeat is fenced by two barriers so the measured window starts when
//! the last rank arrives and ends when the last rank finishes. The reported
//! figure is the minimum over repeats; the remaining statistics are kept for
//! display only.

use crate::comm::Comm;
use crate::error::{BenchError, Result};
use std::hint::black_box;
use std::time::{Duration, Instant};

/// Raw samples of one measurement and their summary
#[derive(Clone, Debug)]
pub struct TimingSummary {
    pub samples: Vec<Duration>,
    pub min: Duration,
    pub median: Duration,
    pub mean: Duration,
    pub max: Duration,
}

impl TimingSummary {
    pub fn from_samples(samples: Vec<Duration>) -> Self {
        if samples.is_empty() {
            return Self {
                samples,
                min: Duration::ZERO,
                median: Duration::ZERO,
                mean: Duration::ZERO,
                max: Duration::ZERO,
            };
        }
        let min = samples.iter().copied().min().unwrap_or_default();
        let max = samples.iter().copied().max().unwrap_or_default();
        let total: Duration = samples.iter().sum();
        let mean = total / samples.len() as u32;
        Self {
            median: calculate_median(&samples),
            samples,
            min,
            mean,
            max,
        }
    }

    /// The reported figure, in seconds
    pub fn min_seconds(&self) -> f64 {
        self.min.as_secs_f64()
    }
}

/// A kernel's functional value together with its timing
#[derive(Clone, Debug)]
pub struct Measured<V> {
    pub value: V,
    pub timing: TimingSummary,
}

/// Time `op` `repeats` times between barriers and keep every sample.
///
/// Collective: every member of `group` must call it with the same `repeats`.
pub fn measure_min_time<C, F, R>(group: &C, repeats: usize, mut op: F) -> Result<TimingSummary>
where
    C: Comm,
    F: FnMut() -> Result<R>,
{
    if repeats == 0 {
        return Err(BenchError::InvalidConfig(
            "repeat count must be at least 1".to_string(),
        ));
    }
    let mut samples = Vec::with_capacity(repeats);
    for _ in 0..repeats {
        group.barrier()?;
        let start = Instant::now();
        black_box(op()?);
        group.barrier()?;
        samples.push(start.elapsed());
    }
    Ok(TimingSummary::from_samples(samples))
}

/// One untimed call for the functional value, then `repeats` timed calls.
pub fn measure_kernel<C, F, V>(group: &C, repeats: usize, mut op: F) -> Result<Measured<V>>
where
    C: Comm,
    F: FnMut() -> Result<V>,
{
    if repeats == 0 {
        return Err(BenchError::InvalidConfig(
            "repeat count must be at least 1".to_string(),
        ));
    }
    let value = op()?;
    let timing = measure_min_time(group, repeats, &mut op)?;
    Ok(Measured { value, timing })
}

/// Calculate median from a slice of durations.
pub fn calculate_median(times: &[Duration]) -> Duration {
    if times.is_empty() {
        return Duration::ZERO;
    }
    let mut sorted = times.to_vec();
    sorted.sort();
    sorted[sorted.len() / 2]
}
