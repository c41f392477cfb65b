// SWEEP CONTROLLER
// WALKS THE (CONFLICT x THREADS) MATRIX CONFLICT-OUTER, THREADS-INNER.
// EXACTLY ONE WORKLOAD PROCESS IS ALIVE AT ANY TIME. THE FIRST FAILING CELL
// ABORTS THE SWEEP; AGGREGATION ASSUMES A COMPLETE MATRIX.
//
// WORK DIRECTORIES:
//   PER-CELL (DEFAULT): FRESH .work-* DIR UNDER THE OUTPUT ROOT FOR EVERY RUN.
//                       SAME FILESYSTEM AS THE DESTINATION, SO MOVES ARE RENAMES.
//                       KEPT ON FAILURE FOR POST-MORTEM.
//   SHARED:             ONE FIXED DIR FOR ALL RUNS. A STALE-ARTIFACT CHECK
//                       GUARDS EVERY CELL.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::artifacts::{self, CollectedArtifacts};
use crate::error::SweepError;
use crate::invoke::RunInvoker;
use crate::params::{SweepCell, SweepParameters};
use crate::rates::{self, RateRow};
use crate::summary::{self, MatrixRow};

const WORKDIR_PREFIX: &str = ".work-";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum WorkdirMode {
    #[default]
    PerCell,
    Shared(PathBuf),
}

#[derive(Clone, Debug)]
pub struct CellResult {
    pub cell: SweepCell,
    pub artifacts: CollectedArtifacts,
    pub elapsed: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct SweepOutcome {
    // IN EXECUTION ORDER
    pub cells: Vec<CellResult>,
}

pub struct SweepController {
    params: SweepParameters,
    invoker: RunInvoker,
    workdir: WorkdirMode,
}

impl SweepController {
    pub fn new(params: SweepParameters, invoker: RunInvoker) -> Result<Self, SweepError> {
        params.validate()?;
        Ok(Self { params, invoker, workdir: WorkdirMode::default() })
    }

    pub fn workdir(mut self, mode: WorkdirMode) -> Self {
        self.workdir = mode;
        self
    }

    pub fn params(&self) -> &SweepParameters {
        &self.params
    }

    pub fn run(&self) -> Result<SweepOutcome, SweepError> {
        let root = &self.params.out_root;
        fs::create_dir_all(root).map_err(|e| SweepError::io(root, e))?;

        let cells = self.params.cells();
        let total = cells.len();
        let mut outcome = SweepOutcome { cells: Vec::with_capacity(total) };

        for (i, cell) in cells.into_iter().enumerate() {
            info!("[{}/{}] {}", i + 1, total, cell);
            let result = self.run_cell(cell)?;
            info!(
                "[{}/{}] {} done in {:.1}s -> {}",
                i + 1,
                total,
                result.cell,
                result.elapsed.as_secs_f64(),
                result.artifacts.dest.display()
            );
            outcome.cells.push(result);
        }
        Ok(outcome)
    }

    fn run_cell(&self, cell: SweepCell) -> Result<CellResult, SweepError> {
        let root = &self.params.out_root;
        let dest = cell.dest_dir(root);
        fs::create_dir_all(&dest).map_err(|e| SweepError::io(&dest, e))?;

        let start = Instant::now();
        let artifacts = match &self.workdir {
            WorkdirMode::PerCell => {
                let work = tempfile::Builder::new()
                    .prefix(WORKDIR_PREFIX)
                    .tempdir_in(root)
                    .map_err(|e| SweepError::io(root, e))?;
                let res = self.execute(&cell, work.path(), &dest);
                if res.is_err() {
                    let kept = work.keep();
                    warn!("[{}] work directory kept at {}", cell, kept.display());
                }
                res?
            }
            WorkdirMode::Shared(dir) => {
                fs::create_dir_all(dir).map_err(|e| SweepError::io(dir, e))?;
                self.execute(&cell, dir, &dest)?
            }
        };

        Ok(CellResult { cell, artifacts, elapsed: start.elapsed() })
    }

    fn execute(&self, cell: &SweepCell, workdir: &Path, dest: &Path) -> Result<CollectedArtifacts, SweepError> {
        artifacts::ensure_clean(cell, workdir)?;
        self.invoker.run(cell, &self.params, workdir)?;
        artifacts::collect(cell, workdir, dest)
    }
}

// ---------------------------------------------------------------------------
// POST-SWEEP AGGREGATION
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Aggregates {
    pub matrix_path: PathBuf,
    pub matrix: Vec<MatrixRow>,
    pub rates_path: PathBuf,
    pub rates: Vec<RateRow>,
}

// BOTH STAGES: summary_matrix.tsv, THEN summary_rates.tsv
pub fn aggregate(root: &Path, ops: u64) -> Result<Aggregates, SweepError> {
    let (matrix_path, matrix) = summary::write_matrix(root)?;
    info!("wrote {} ({} rows)", matrix_path.display(), matrix.len());
    let (rates_path, rates) = rates::write_rates(root, ops)?;
    info!("wrote {} ({} rows)", rates_path.display(), rates.len());
    Ok(Aggregates { matrix_path, matrix, rates_path, rates })
}
