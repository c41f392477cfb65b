use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use abortsweep::params::{DEFAULT_OPS, DEFAULT_OUT_ROOT};
use abortsweep::rates::render_rate_report;
use abortsweep::sweep::aggregate;

#[derive(Args)]
pub struct AggregateArgs {
    // OUTPUT ROOT OF A FINISHED SWEEP
    #[arg(long, default_value = DEFAULT_OUT_ROOT)]
    out: PathBuf,

    // OPERATIONS PER RUN THE SWEEP WAS STARTED WITH
    #[arg(long, default_value_t = DEFAULT_OPS)]
    ops: u64,
}

pub fn run_aggregate(args: AggregateArgs) -> Result<()> {
    let agg = aggregate(&args.out, args.ops)
        .with_context(|| format!("AGGREGATION OF {} FAILED", args.out.display()))?;
    print!("{}", render_rate_report(&agg.rates, args.ops));
    println!("MATRIX:  {} ({} ROWS)", agg.matrix_path.display(), agg.matrix.len());
    println!("RATES:   {} ({} ROWS)", agg.rates_path.display(), agg.rates.len());
    Ok(())
}
