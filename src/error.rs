// SWEEP ERROR TAXONOMY
// EVERYTHING HERE IS FATAL TO THE WHOLE SWEEP. NOTHING IS RETRIED.
// CELL-SCOPED VARIANTS CARRY THE CELL SO THE MESSAGE NAMES ITS COORDINATES.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::params::SweepCell;
use crate::summary::ParseError;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("invalid sweep parameters: {0}")]
    InvalidParameters(String),

    #[error("[{cell}] failed to launch workload {}: {source}", .program.display())]
    Launch {
        cell: SweepCell,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[{cell}] workload exited unsuccessfully ({status})")]
    WorkloadFailed { cell: SweepCell, status: ExitStatus },

    #[error("[{cell}] workload did not finish within {timeout:?}")]
    Timeout { cell: SweepCell, timeout: Duration },

    #[error("[{cell}] missing artifact {}", .path.display())]
    MissingArtifact { cell: SweepCell, path: PathBuf },

    #[error("[{cell}] stale artifact {} present before the run", .path.display())]
    StaleArtifact { cell: SweepCell, path: PathBuf },

    #[error("malformed summary {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SweepError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SweepError::Io { path: path.into(), source }
    }

    // THE CELL TO RE-RUN, IF THE FAILURE BELONGS TO ONE
    pub fn cell(&self) -> Option<&SweepCell> {
        match self {
            SweepError::Launch { cell, .. }
            | SweepError::WorkloadFailed { cell, .. }
            | SweepError::Timeout { cell, .. }
            | SweepError::MissingArtifact { cell, .. }
            | SweepError::StaleArtifact { cell, .. } => Some(cell),
            _ => None,
        }
    }
}
