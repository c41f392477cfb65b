use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use abortsweep::invoke::{Isolation, RunInvoker, DEFAULT_NICE};
use abortsweep::params::{
    SweepParameters, DEFAULT_CONFLICTS, DEFAULT_OPS, DEFAULT_OUT_ROOT, DEFAULT_SEED,
    DEFAULT_THREADS,
};
use abortsweep::rates::render_rate_report;
use abortsweep::sweep::{aggregate, SweepController, WorkdirMode};

use super::DEFAULT_WORKLOAD;

#[derive(Args)]
pub struct RunArgs {
    // THREAD COUNTS, COMMA SEPARATED (INNER LOOP)
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_THREADS)]
    threads: Vec<usize>,

    // CONFLICT LABELS, COMMA SEPARATED (OUTER LOOP), PASSED THROUGH VERBATIM
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_CONFLICTS.map(String::from))]
    conflicts: Vec<String>,

    // OPERATIONS PER RUN (ALSO THE RATE DENOMINATOR)
    #[arg(long, default_value_t = DEFAULT_OPS)]
    ops: u64,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    // OUTPUT ROOT: <out>/<conflict>/t<threads>/
    #[arg(long, default_value = DEFAULT_OUT_ROOT)]
    out: PathBuf,

    // WORKLOAD EXECUTABLE
    #[arg(long, default_value = DEFAULT_WORKLOAD)]
    workload: PathBuf,

    // EXTRA ARGUMENT PLACED BEFORE --threads (REPEATABLE)
    #[arg(long = "workload-arg", allow_hyphen_values = true)]
    workload_args: Vec<String>,

    // CHILD NICENESS (-20 = HIGHEST, NEEDS ROOT OR CAP_SYS_NICE)
    #[arg(long, default_value_t = DEFAULT_NICE, allow_negative_numbers = true)]
    nice: i32,

    // INHERIT OUR PRIORITY INSTEAD OF SETTING --nice
    #[arg(long)]
    no_nice: bool,

    // DO NOT PIN THE WORKLOAD TO CPUS 0..T-1
    #[arg(long)]
    no_pin: bool,

    // KILL A RUN THAT EXCEEDS THIS MANY SECONDS (DEFAULT: WAIT FOREVER)
    #[arg(long)]
    timeout_secs: Option<u64>,

    // USE ONE SHARED WORK DIRECTORY INSTEAD OF A FRESH ONE PER CELL
    #[arg(long)]
    workdir: Option<PathBuf>,
}

pub fn run_sweep(args: RunArgs) -> Result<()> {
    let params = SweepParameters {
        threads: args.threads,
        conflicts: args.conflicts,
        ops: args.ops,
        seed: args.seed,
        out_root: args.out,
    };
    let isolation = Isolation {
        nice: if args.no_nice { None } else { Some(args.nice) },
        pin_cpus: !args.no_pin,
    };
    let invoker = RunInvoker::new(args.workload)
        .leading_args(args.workload_args)
        .isolation(isolation)
        .timeout(args.timeout_secs.map(Duration::from_secs));
    let mode = match args.workdir {
        Some(dir) => WorkdirMode::Shared(dir),
        None => WorkdirMode::PerCell,
    };

    let ctl = SweepController::new(params, invoker.clone())?.workdir(mode.clone());
    let params = ctl.params();

    println!("ABORTSWEEP");
    println!("WORKLOAD:        {}", invoker.program().display());
    println!("THREADS:         {:?}", params.threads);
    println!("CONFLICTS:       {:?}", params.conflicts);
    println!("OPS:             {}", params.ops);
    println!("SEED:            {}", params.seed);
    println!("OUTPUT:          {}", params.out_root.display());
    println!("NICE:            {}",
             isolation.nice.map(|n| n.to_string()).unwrap_or_else(|| "inherited".into()));
    println!("PINNING:         {}", if isolation.pin_cpus { "CPUS 0..T-1" } else { "OFF" });
    println!("WORKDIR:         {}", match &mode {
        WorkdirMode::PerCell => "PER CELL".to_string(),
        WorkdirMode::Shared(dir) => dir.display().to_string(),
    });
    println!("CELLS:           {}", params.cells().len());
    println!();

    let outcome = ctl.run().context("SWEEP ABORTED")?;
    println!("SWEEP COMPLETE: {} CELLS", outcome.cells.len());
    println!();

    let agg = aggregate(&params.out_root, params.ops).context("AGGREGATION FAILED")?;
    print!("{}", render_rate_report(&agg.rates, params.ops));
    println!("MATRIX:  {}", agg.matrix_path.display());
    println!("RATES:   {}", agg.rates_path.display());
    Ok(())
}
