// RATE AGGREGATION
// RE-SCANS THE RELOCATED SUMMARIES, RECOVERS EACH CELL FROM ITS PATH
// (<conflict>/t<threads>/summary.txt) AND WRITES summary_rates.tsv WITH
// rate = aborts / ops.
//
// ORDERING: CONFLICT LABEL (BYTEWISE ASCENDING), THEN THREADS (NUMERIC ASCENDING).
// LEAVES THAT ARE NOT t<digits> ARE SKIPPED SILENTLY.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::error::SweepError;
use crate::params::SweepCell;
use crate::summary::{find_summaries, read_summary};

pub const RATES_FILE: &str = "summary_rates.tsv";

#[derive(Clone, Debug, PartialEq)]
pub struct RateRow {
    pub conflict: String,
    pub threads: usize,
    pub events: u64,
    pub aborts: u64,
    pub rate: f64,
}

fn leaf_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^t([0-9]+)$").expect("static regex"))
}

// root/<conflict>/t<threads>/summary.txt -> (conflict, threads)
pub fn parse_cell_path(summary: &Path) -> Option<SweepCell> {
    let leaf_dir = summary.parent()?;
    let leaf = leaf_dir.file_name()?.to_str()?;
    let threads = leaf_re().captures(leaf)?.get(1)?.as_str().parse::<usize>().ok()?;
    let conflict = leaf_dir.parent()?.file_name()?.to_str()?;
    Some(SweepCell::new(conflict, threads))
}

pub fn abort_rate(aborts: u64, ops: u64) -> f64 {
    aborts as f64 / ops as f64
}

pub fn collect_rates(root: &Path, ops: u64) -> Result<Vec<RateRow>, SweepError> {
    if ops == 0 {
        return Err(SweepError::InvalidParameters("operation count must be at least 1".into()));
    }

    let mut rows = Vec::new();
    for path in find_summaries(root)? {
        let cell = match parse_cell_path(&path) {
            Some(c) => c,
            None => {
                debug!("skipping {} (not <conflict>/t<threads>)", path.display());
                continue;
            }
        };
        let rec = read_summary(&path)?;
        rows.push(RateRow {
            conflict: cell.conflict,
            threads: cell.threads,
            events: rec.events_total,
            aborts: rec.aborts,
            rate: abort_rate(rec.aborts, ops),
        });
    }

    rows.sort_by(|a, b| a.conflict.cmp(&b.conflict).then(a.threads.cmp(&b.threads)));
    Ok(rows)
}

pub fn format_rates(rows: &[RateRow]) -> String {
    let mut out = String::from("conflict\tthreads\tevents\taborts\trate\n");
    for r in rows {
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{:.6}\n",
            r.conflict, r.threads, r.events, r.aborts, r.rate
        ));
    }
    out
}

pub fn write_rates(root: &Path, ops: u64) -> Result<(PathBuf, Vec<RateRow>), SweepError> {
    let rows = collect_rates(root, ops)?;
    let path = root.join(RATES_FILE);
    fs::write(&path, format_rates(&rows)).map_err(|e| SweepError::io(&path, e))?;
    Ok((path, rows))
}

// HUMAN-READABLE TABLE FOR THE END OF A SWEEP
pub fn render_rate_report(rows: &[RateRow], ops: u64) -> String {
    let sep = "=".repeat(60);
    let mut report = Vec::new();
    report.push(sep.clone());
    report.push(format!("ABORT RATES (DENOMINATOR: {} OPS)", ops));
    report.push(sep.clone());
    report.push(format!(
        "{:<10} {:>7} {:>12} {:>10} {:>10}",
        "CONFLICT", "THREADS", "EVENTS", "ABORTS", "RATE"
    ));
    report.push(format!(
        "{} {} {} {} {}",
        "-".repeat(10),
        "-".repeat(7),
        "-".repeat(12),
        "-".repeat(10),
        "-".repeat(10),
    ));
    for r in rows {
        report.push(format!(
            "{:<10} {:>7} {:>12} {:>10} {:>10.6}",
            r.conflict, r.threads, r.events, r.aborts, r.rate
        ));
    }
    if rows.is_empty() {
        report.push("(NO CELLS FOUND)".to_string());
    }
    report.push(sep);
    report.join("\n") + "\n"
}
