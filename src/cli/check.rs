use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;

use abortsweep::params::DEFAULT_THREADS;

use super::DEFAULT_WORKLOAD;

#[derive(Args)]
pub struct CheckArgs {
    // WORKLOAD EXECUTABLE TO CHECK
    #[arg(long, default_value = DEFAULT_WORKLOAD)]
    workload: PathBuf,

    // THREAD COUNTS THE SWEEP WILL USE
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_THREADS)]
    threads: Vec<usize>,
}

fn check_workload(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.permissions().mode() & 0o111 != 0 => {
            println!("  {:<24}OK ({})", "workload", path.display());
            true
        }
        Ok(_) => {
            println!("  {:<24}NOT EXECUTABLE ({})", "workload", path.display());
            false
        }
        Err(_) => {
            println!("  {:<24}MISSING ({})", "workload", path.display());
            println!("    BUILD IT: cargo build --release --example stm_abort --features memtrace");
            false
        }
    }
}

fn online_cpus() -> usize {
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n < 1 { 1 } else { n as usize }
}

// OVERSUBSCRIPTION IS A WARNING ONLY: THE MASK SELECTS CPUS THAT DO NOT
// EXIST, THE KERNEL KEEPS THE ONLINE ONES AND THREADS SHARE CORES
fn check_cpus(threads: &[usize], online: usize) -> bool {
    let max = threads.iter().copied().max().unwrap_or(0);
    if max <= online {
        println!("  {:<24}OK ({} online, max threads {})", "cpus", online, max);
        true
    } else {
        println!("  {:<24}WARN ONLY {} ONLINE, SWEEP ASKS FOR {} -- CELLS ABOVE {} OVERSUBSCRIBE",
                 "cpus", online, max, online);
        false
    }
}

fn check_priority() -> bool {
    // nice -20 NEEDS ROOT (OR CAP_SYS_NICE, NOT PROBED HERE)
    if unsafe { libc::geteuid() } == 0 {
        println!("  {:<24}OK (root)", "priority");
        true
    } else {
        println!("  {:<24}NOT ROOT -- RUN WITH sudo OR PASS --no-nice", "priority");
        false
    }
}

pub fn run_check(args: CheckArgs) -> Result<()> {
    println!("ABORTSWEEP ENVIRONMENT CHECK");
    println!();

    let mut ok = true;
    ok &= check_workload(&args.workload);
    // DOES NOT AFFECT THE RESULT
    check_cpus(&args.threads, online_cpus());
    ok &= check_priority();
    println!();

    if !ok {
        bail!("SOME CHECKS FAILED");
    }
    println!("ALL CHECKS PASSED");
    Ok(())
}
