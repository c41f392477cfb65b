// SWEEP PARAMETERS AND CELLS
// A CELL IS ONE (CONFLICT, THREADS) PAIR. ITS IDENTITY FIXES BOTH THE
// WORKLOAD ARGUMENTS AND THE DESTINATION DIRECTORY root/<conflict>/t<threads>.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::affinity::MAX_CPUS;
use crate::error::SweepError;
use crate::rates::RATES_FILE;
use crate::summary::MATRIX_FILE;

// WORKLOAD DEFAULTS
pub const DEFAULT_THREADS: [usize; 4] = [1, 2, 4, 8];
pub const DEFAULT_CONFLICTS: [&str; 3] = ["low", "med", "high"];
pub const DEFAULT_OPS: u64 = 1_000_000;
pub const DEFAULT_SEED: u64 = 1;
pub const DEFAULT_OUT_ROOT: &str = "results/stm";

#[derive(Clone, Debug)]
pub struct SweepParameters {
    pub threads: Vec<usize>,
    // OPAQUE LABELS, PASSED THROUGH VERBATIM
    pub conflicts: Vec<String>,
    pub ops: u64,
    pub seed: u64,
    pub out_root: PathBuf,
}

impl Default for SweepParameters {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS.to_vec(),
            conflicts: DEFAULT_CONFLICTS.iter().map(|s| s.to_string()).collect(),
            ops: DEFAULT_OPS,
            seed: DEFAULT_SEED,
            out_root: PathBuf::from(DEFAULT_OUT_ROOT),
        }
    }
}

impl SweepParameters {
    pub fn validate(&self) -> Result<(), SweepError> {
        let invalid = |msg: String| Err(SweepError::InvalidParameters(msg));

        if self.threads.is_empty() {
            return invalid("no thread counts given".into());
        }
        let mut seen = HashSet::new();
        for &t in &self.threads {
            if t == 0 || t > MAX_CPUS {
                return invalid(format!("thread count {} outside 1..={}", t, MAX_CPUS));
            }
            if !seen.insert(t) {
                return invalid(format!("thread count {} listed twice", t));
            }
        }

        if self.conflicts.is_empty() {
            return invalid("no conflict levels given".into());
        }
        let mut seen = HashSet::new();
        for c in &self.conflicts {
            // THE LABEL BECOMES A DIRECTORY NAME
            if c.is_empty() || c.starts_with('.') || c.contains('/') {
                return invalid(format!("conflict label {:?} is not a valid directory name", c));
            }
            // TAB AND NEWLINE WOULD SPLIT TSV COLUMNS AND ROWS
            if c.chars().any(char::is_control) {
                return invalid(format!("conflict label {:?} contains control characters", c));
            }
            // THE TABLES LIVE NEXT TO THE LABEL DIRECTORIES
            if c == MATRIX_FILE || c == RATES_FILE {
                return invalid(format!("conflict label {:?} collides with an output table", c));
            }
            if !seen.insert(c.as_str()) {
                return invalid(format!("conflict label {:?} listed twice", c));
            }
        }

        if self.ops == 0 {
            return invalid("operation count must be at least 1".into());
        }
        Ok(())
    }

    // CONFLICT OUTER, THREADS INNER. THIS ORDER IS THE EXECUTION ORDER.
    pub fn cells(&self) -> Vec<SweepCell> {
        self.conflicts
            .iter()
            .flat_map(|c| self.threads.iter().map(move |&t| SweepCell::new(c.clone(), t)))
            .collect()
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SweepCell {
    pub conflict: String,
    pub threads: usize,
}

impl SweepCell {
    pub fn new(conflict: impl Into<String>, threads: usize) -> Self {
        Self { conflict: conflict.into(), threads }
    }

    pub fn dest_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.conflict).join(format!("t{}", self.threads))
    }

    pub fn workload_args(&self, params: &SweepParameters) -> Vec<String> {
        vec![
            "--threads".into(),
            self.threads.to_string(),
            "--conflict".into(),
            self.conflict.clone(),
            "--ops".into(),
            params.ops.to_string(),
            "--seed".into(),
            params.seed.to_string(),
        ]
    }
}

impl fmt::Display for SweepCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conflict={} threads={}", self.conflict, self.threads)
    }
}
