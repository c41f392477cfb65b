use anyhow::{bail, Result};
use clap::Args;

use abortsweep::affinity::{CpuMask, MAX_CPUS};

#[derive(Args)]
pub struct MaskArgs {
    // THREAD COUNT OF THE RUN
    threads: usize,
}

pub fn run_mask(args: MaskArgs) -> Result<()> {
    if args.threads == 0 || args.threads > MAX_CPUS {
        bail!("THREAD COUNT MUST BE IN 1..={}", MAX_CPUS);
    }
    let mask = CpuMask::first_n(args.threads);
    println!("{}", mask.to_hex());
    Ok(())
}
