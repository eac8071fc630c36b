mod arrival_queue;
mod config;
mod error;
mod gate;
mod inventory;
mod logging;
mod sim;
mod truck;
mod types;
mod warehouse;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::SimConfig;

#[derive(Parser)]
#[command(name = "haulage")]
#[command(about = "Trucks haul blocks between concurrently running warehouses")]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one delivery and print a summary (default)
    Run(RunArgs),
    /// Run one delivery and print a CSV row
    Bench(RunArgs),
    /// Sweep fleet sizes and capacities, one CSV row per combination
    Stress(StressArgs),
}

#[derive(Args, Default)]
struct TimingArgs {
    /// Shortest travel leg in milliseconds
    #[arg(long)]
    travel_min_ms: Option<u64>,
    /// Longest travel leg in milliseconds
    #[arg(long)]
    travel_max_ms: Option<u64>,
    /// Loading time per block in microseconds
    #[arg(long)]
    load_us: Option<u64>,
    /// Unloading time per block in microseconds
    #[arg(long)]
    unload_us: Option<u64>,
}

impl TimingArgs {
    fn apply(&self, config: &mut SimConfig) {
        if let Some(ms) = self.travel_min_ms {
            config.travel.min = Duration::from_millis(ms);
        }
        if let Some(ms) = self.travel_max_ms {
            config.travel.max = Duration::from_millis(ms);
        }
        if let Some(us) = self.load_us {
            config.service.load_per_block = Duration::from_micros(us);
        }
        if let Some(us) = self.unload_us {
            config.service.unload_per_block = Duration::from_micros(us);
        }
    }
}

#[derive(Args, Default)]
struct RunArgs {
    /// Number of trucks
    #[arg(long)]
    trucks: Option<usize>,
    /// Blocks each truck can hold
    #[arg(long)]
    capacity: Option<usize>,
    /// Blocks issued at the source warehouse
    #[arg(long)]
    blocks: Option<usize>,
    /// Source -> destination round trips per truck
    #[arg(long)]
    laps: Option<usize>,
    #[command(flatten)]
    timing: TimingArgs,
}

impl RunArgs {
    fn to_config(&self) -> SimConfig {
        let mut config = SimConfig::default();
        if let Some(trucks) = self.trucks {
            config.trucks = trucks;
        }
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(blocks) = self.blocks {
            config.blocks = blocks;
        }
        if let Some(laps) = self.laps {
            config.laps = laps;
        }
        self.timing.apply(&mut config);
        config
    }
}

#[derive(Args)]
struct StressArgs {
    /// Comma-separated truck counts
    #[arg(long, value_delimiter = ',', default_values_t = [1usize, 2, 4, 8, 12])]
    truck_sets: Vec<usize>,
    /// Comma-separated truck capacities
    #[arg(long, value_delimiter = ',', default_values_t = [10usize, 100, 1000])]
    capacity_sets: Vec<usize>,
    /// Source -> destination round trips per truck
    #[arg(long)]
    laps: Option<usize>,
    #[command(flatten)]
    timing: TimingArgs,
}

fn execute(command: Commands) -> Result<bool> {
    match command {
        Commands::Run(args) => {
            let report = sim::run_delivery(&args.to_config()).context("delivery run failed")?;
            sim::print_summary(&report);
            Ok(report.is_correct())
        }
        Commands::Bench(args) => {
            sim::run_benchmark(&args.to_config()).context("benchmark run failed")
        }
        Commands::Stress(args) => {
            let mut base = SimConfig::default();
            if let Some(laps) = args.laps {
                base.laps = laps;
            }
            args.timing.apply(&mut base);
            sim::run_stress(&args.truck_sets, &args.capacity_sets, &base)
                .context("stress run failed")
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let command = cli.command.unwrap_or(Commands::Run(RunArgs::default()));
    match execute(command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
