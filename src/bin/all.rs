//! CLI for running the kernel sweep.
//!
//! Usage:
//!   spmd-bench                          # Run every kernel with defaults
//!   spmd-bench --list                   # List available kernels
//!   spmd-bench --config bench.json      # Load a JSON config
//!   spmd-bench --kernels fox_multiply --procs 1,4,9 --sizes 360,720
//!   mpirun -n 4 spmd-bench --mpi        # One rank per process (feature `mpi`)

use anyhow::{Context, Result};
use clap::Parser;
use spmd_bench::config::BenchConfig;
use spmd_bench::registry::KernelKind;
use spmd_bench::utils::bench::{export_csv, time_seed, ResultRecord};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spmd-bench", version, about = "SPMD kernel benchmarks")]
struct Cli {
    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Kernels to run (comma-separated)
    #[arg(long, value_delimiter = ',')]
    kernels: Option<Vec<KernelKind>>,

    /// Problem sizes (comma-separated)
    #[arg(long, value_delimiter = ',')]
    sizes: Option<Vec<usize>>,

    /// Process counts (comma-separated)
    #[arg(long = "procs", value_delimiter = ',')]
    processes: Option<Vec<usize>>,

    /// Timed repeats per measurement
    #[arg(long, short = 'r')]
    repeats: Option<usize>,

    /// Send modes for the send-mode kernel (comma-separated)
    #[arg(long, value_delimiter = ',')]
    modes: Option<Vec<String>>,

    /// Seed for input generation (default: time-based)
    #[arg(long)]
    seed: Option<u64>,

    /// Export results to CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Print results as JSON instead of tables
    #[arg(long)]
    json: bool,

    /// List available kernels and exit
    #[arg(long, short = 'l')]
    list: bool,

    /// Pin rank threads to CPU cores
    #[arg(long)]
    pin: bool,

    /// Verbose logging (debug level)
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Run on the MPI job this process was launched in instead of in-process ranks
    #[cfg(feature = "mpi")]
    #[arg(long)]
    mpi: bool,
}

impl Cli {
    fn into_config(self) -> Result<BenchConfig> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => BenchConfig::default(),
        };
        if let Some(kernels) = self.kernels {
            config.kernels = kernels;
        }
        if let Some(sizes) = self.sizes {
            config.sizes = sizes;
        }
        if let Some(processes) = self.processes {
            config.processes = processes;
        }
        if let Some(repeats) = self.repeats {
            config.repeats = repeats;
        }
        if let Some(modes) = self.modes {
            config.modes = modes;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.csv.is_some() {
            config.csv = self.csv;
        }
        config.pin_ranks |= self.pin;
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Sweep on in-process ranks; every record comes back to this process.
fn run_local(config: &BenchConfig) -> Result<Option<Vec<ResultRecord>>> {
    let records = spmd_bench::run_sweep(config).context("benchmark sweep failed")?;
    Ok(Some(records))
}

/// Sweep on the MPI world; only rank 0 returns records.
#[cfg(feature = "mpi")]
fn run_mpi(config: &mut BenchConfig) -> Result<Option<Vec<ResultRecord>>> {
    use spmd_bench::comm::{Comm, MpiGroup};

    let world = MpiGroup::init().context("failed to initialise MPI")?;
    // every process must generate the same inputs
    let mut seed = vec![config.seed.unwrap_or_else(time_seed)];
    world.broadcast(&mut seed, 0)?;
    config.seed = seed.first().copied();
    let records = spmd_bench::run_sweep_on(&world, config).context("benchmark sweep failed")?;
    Ok((world.rank() == 0).then_some(records))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if cli.list {
        spmd_bench::tui::print_available_kernels();
        return Ok(());
    }

    let json = cli.json;
    #[cfg(feature = "mpi")]
    let use_mpi = cli.mpi;
    let mut config = cli.into_config()?;

    #[cfg(feature = "mpi")]
    let outcome = if use_mpi {
        run_mpi(&mut config)?
    } else {
        config.seed = Some(config.seed.unwrap_or_else(time_seed));
        run_local(&config)?
    };
    #[cfg(not(feature = "mpi"))]
    let outcome = {
        config.seed = Some(config.seed.unwrap_or_else(time_seed));
        run_local(&config)?
    };

    let Some(records) = outcome else {
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        spmd_bench::tui::print_header();
        spmd_bench::tui::print_config_box(&config, config.seed.unwrap_or_default());
        spmd_bench::tui::print_results(&records);
    }

    if let Some(path) = &config.csv {
        export_csv(path, &records)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), rows = records.len(), "results exported");
    }
    Ok(())
}
