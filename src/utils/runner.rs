//! Sweep runner: every kernel variant over every size and process count.

use crate::comm::{Comm, Universe};
use crate::config::BenchConfig;
use crate::error::Result;
use crate::harness::{measure_kernel, TimingSummary};
use crate::registry::{kernels_for, Kernel};
use crate::utils::bench::{time_seed, ResultRecord};
use tracing::{info, warn};

/// Run the whole sweep described by `config` and return rank 0's records.
///
/// Combinations rejected with a configuration error are logged and skipped;
/// any other failure aborts the sweep.
pub fn run_sweep(config: &BenchConfig) -> Result<Vec<ResultRecord>> {
    let (kernels, seed) = plan(config)?;
    let mut records = Vec::new();
    for &processes in &config.processes {
        let universe = Universe::new(processes)?.with_pinning(config.pin_ranks);
        let per_rank = universe.run(|world| run_on_rank(&world, &kernels, config, seed))?;
        records.extend(per_rank.into_iter().next().unwrap_or_default());
    }
    Ok(records)
}

/// Run the sweep on an already launched `world`, at its size only.
///
/// Every rank must call this with the same configuration and a fixed seed.
/// Rank 0 gets the records; the other ranks get an empty list.
pub fn run_sweep_on<C: Comm>(world: &C, config: &BenchConfig) -> Result<Vec<ResultRecord>> {
    let (kernels, seed) = plan(config)?;
    if !config.processes.contains(&world.size()) {
        warn!(
            processes = world.size(),
            configured = ?config.processes,
            "launched process count is not in the configured list"
        );
    }
    run_on_rank(world, &kernels, config, seed)
}

/// Validate, expand the kernel variants and settle the seed.
fn plan(config: &BenchConfig) -> Result<(Vec<Kernel>, u64)> {
    config.validate()?;
    let kernels: Vec<Kernel> = kernels_for(config)
        .into_iter()
        .filter_map(|kernel| match kernel {
            Ok(kernel) => Some(kernel),
            Err(err) => {
                warn!(%err, "skipping kernel variant");
                None
            }
        })
        .collect();
    let seed = config.seed.unwrap_or_else(time_seed);
    info!(seed, variants = kernels.len(), "starting sweep");
    Ok((kernels, seed))
}

fn run_on_rank<C: Comm>(
    world: &C,
    kernels: &[Kernel],
    config: &BenchConfig,
    seed: u64,
) -> Result<Vec<ResultRecord>> {
    let mut records = Vec::new();
    for kernel in kernels {
        let sizes = match kernel.fixed_size() {
            Some(size) => vec![size],
            None => config.sizes.clone(),
        };
        for size in sizes {
            match measure_one(world, kernel, size, config.repeats, seed) {
                Ok(record) if world.rank() == 0 => {
                    info!(
                        kernel = %record.kernel,
                        variant = %record.variant,
                        processes = record.processes,
                        size,
                        time_s = record.time_s,
                        result = ?record.result,
                        "measured"
                    );
                    records.push(record);
                }
                Ok(_) => {}
                Err(err) if err.is_configuration() => {
                    if world.rank() == 0 {
                        warn!(
                            kernel = kernel.name(),
                            variant = %kernel.variant(),
                            processes = world.size(),
                            size,
                            %err,
                            "skipping configuration"
                        );
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
    Ok(records)
}

/// Check, generate inputs, take the untimed value, then time.
///
/// Kernels that time themselves (ping-pong) report their own measurements
/// from the timed calls instead of the harness window.
fn measure_one<C: Comm>(
    world: &C,
    kernel: &Kernel,
    size: usize,
    repeats: usize,
    seed: u64,
) -> Result<ResultRecord> {
    kernel.check(world.size(), size)?;
    // same inputs for a given size at every process count
    let workload = kernel.prepare(world, size, seed.wrapping_add(size as u64));
    let mut own_times = Vec::with_capacity(repeats + 1);
    let measured = measure_kernel(world, repeats, || {
        let outcome = kernel.execute(world, &workload, size)?;
        own_times.extend(outcome.own_time);
        Ok(outcome.value)
    })?;
    let timing = if own_times.is_empty() {
        measured.timing
    } else {
        // the first entry belongs to the untimed call
        TimingSummary::from_samples(own_times.split_off(1))
    };
    Ok(ResultRecord::new(
        kernel.name(),
        kernel.variant(),
        world.size(),
        size,
        &timing,
        measured.value,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::measure_min_time;
    use crate::registry::{KernelKind, Workload};

    fn quick_config() -> BenchConfig {
        BenchConfig {
            sizes: vec![8],
            processes: vec![1, 2, 4],
            repeats: 2,
            message_bytes: 64,
            round_trips: 5,
            comm_rounds: 2,
            compute_iters: 1000,
            seed: Some(1),
            ..BenchConfig::default()
        }
    }

    #[test]
    fn test_invalid_combinations_are_skipped() {
        let mut config = quick_config();
        config.kernels = vec![KernelKind::FoxMultiply, KernelKind::PingPong];
        let records = run_sweep(&config).unwrap();
        // fox runs on 1 and 4 ranks, ping-pong only on 2
        let fox: Vec<usize> = records
            .iter()
            .filter(|r| r.kernel == "fox_multiply")
            .map(|r| r.processes)
            .collect();
        assert_eq!(fox, vec![1, 4]);
        let ping: Vec<usize> = records
            .iter()
            .filter(|r| r.kernel == "ping_pong")
            .map(|r| r.processes)
            .collect();
        assert_eq!(ping, vec![2]);
        assert!(records.iter().all(|r| r.time_s >= 0.0));
    }

    #[test]
    fn test_products_agree_across_process_counts() {
        let mut config = quick_config();
        config.kernels = vec![KernelKind::StripedMultiply, KernelKind::FoxMultiply];
        let records = run_sweep(&config).unwrap();
        let first = records[0].result.unwrap();
        for record in &records {
            let value = record.result.unwrap();
            assert!((value - first).abs() <= 1e-9 * first.abs().max(1.0));
        }
    }

    #[test]
    fn test_unsupported_mode_is_skipped() {
        let mut config = quick_config();
        config.kernels = vec![KernelKind::SendModes];
        config.processes = vec![2];
        config.modes = vec!["rsend".into(), "isend".into()];
        let records = run_sweep(&config).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].variant, "ready");
        assert!(records[0].result.unwrap() >= 0.0);
    }

    #[test]
    fn test_reductions_report_values() {
        let mut config = quick_config();
        config.kernels = vec![KernelKind::MinMax, KernelKind::Dot];
        let records = run_sweep(&config).unwrap();
        assert_eq!(records.len(), 6);
        assert!(records.iter().all(|r| r.result.is_some()));
    }

    #[test]
    fn test_ping_pong_reports_one_way_latency() {
        let round_trips = 40;
        let kernel = Kernel::PingPong {
            message_bytes: 64,
            round_trips,
        };
        let results = Universe::new(2)
            .unwrap()
            .run(|world| {
                let record = measure_one(&world, &kernel, 64, 3, 1)?;
                // the whole call, setup and barriers included
                let window = measure_min_time(&world, 3, || kernel.execute(&world, &Workload::Empty, 64))?;
                Ok((record, window.min_seconds()))
            })
            .unwrap();
        let (record, window) = &results[0];
        assert!(record.result.is_none());
        assert!(record.time_s > 0.0);
        // one-way latency times the trip count stays within the call time
        let trips = (2 * round_trips) as f64;
        assert!(
            record.time_s * trips <= window * 4.0,
            "latency {} over {} trips vs window {}",
            record.time_s,
            trips,
            window
        );
        assert!(record.time_s < *window);
    }

    #[test]
    fn test_sweep_on_launched_world() {
        let mut config = quick_config();
        config.kernels = vec![KernelKind::Dot, KernelKind::FoxMultiply];
        config.processes = vec![3];
        let results = Universe::new(3)
            .unwrap()
            .run(|world| run_sweep_on(&world, &config))
            .unwrap();
        // fox is skipped on 3 ranks; only rank 0 keeps records
        assert_eq!(results[0].len(), 1);
        assert_eq!(results[0][0].kernel, "dot");
        assert_eq!(results[0][0].processes, 3);
        assert!(results[1].is_empty() && results[2].is_empty());
    }
}
