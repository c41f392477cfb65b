// ABORTSWEEP -- STM ABORT MEASUREMENT SWEEP
// RUNS THE WORKLOAD OVER A (CONFLICT x THREADS) MATRIX, ONE CELL AT A TIME,
// PINNED TO CPUS 0..T-1 AT ELEVATED PRIORITY, THEN TABULATES ABORT RATES.
//
// ANY FAILED CELL ENDS THE RUN WITH A NON-ZERO STATUS AND THE CELL'S COORDINATES.

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "abortsweep")]
#[command(about = "ABORTSWEEP -- STM ABORT MEASUREMENT SWEEP HARNESS")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    // RUN THE FULL MATRIX, THEN BOTH AGGREGATION STAGES
    Run(cli::run::RunArgs),

    // REBUILD summary_matrix.tsv AND summary_rates.tsv FROM AN EXISTING ROOT
    Aggregate(cli::aggregate::AggregateArgs),

    // PRINT THE AFFINITY MASK USED FOR A THREAD COUNT
    Mask(cli::mask::MaskArgs),

    // CHECK WORKLOAD AND PRIORITY PERMISSIONS, WARN IF THREADS EXCEED ONLINE CPUS
    Check(cli::check::CheckArgs),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => cli::run::run_sweep(args),
        Command::Aggregate(args) => cli::aggregate::run_aggregate(args),
        Command::Mask(args) => cli::mask::run_mask(args),
        Command::Check(args) => cli::check::run_check(args),
    }
}
