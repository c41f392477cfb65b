// ARTIFACT COLLECTION
// THE WORKLOAD DROPS FIXED-NAME FILES IN ITS CWD. AFTER EACH RUN THEY ARE
// VERIFIED AND MOVED (NOT COPIED) INTO THE CELL'S DESTINATION, SO THE WORK
// DIRECTORY IS EMPTY OF ARTIFACTS BEFORE THE NEXT CELL STARTS.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::SweepError;
use crate::params::SweepCell;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ArtifactKind {
    AbortTable,
    Summary,
    EventLog,
    AbortLog,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::AbortTable,
        ArtifactKind::Summary,
        ArtifactKind::EventLog,
        ArtifactKind::AbortLog,
    ];

    // NAME THE WORKLOAD WRITES
    pub fn source_name(self) -> &'static str {
        match self {
            Self::AbortTable => "memtrace_abort.csv",
            Self::Summary => "memtrace_summary.txt",
            Self::EventLog => "memtrace.csv",
            Self::AbortLog => "memtrace_abort_full.csv",
        }
    }

    // NAME INSIDE root/<conflict>/t<threads>/
    pub fn dest_name(self) -> &'static str {
        match self {
            Self::AbortTable => "abort.csv",
            Self::Summary => SUMMARY_FILE,
            Self::EventLog => "memtrace.csv",
            Self::AbortLog => "abort_full.csv",
        }
    }

    // BOTH LOGS ARE BEHIND OPTIONAL WORKLOAD FEATURES
    pub fn required(self) -> bool {
        !matches!(self, Self::EventLog | Self::AbortLog)
    }
}

pub const SUMMARY_FILE: &str = "summary.txt";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectedArtifacts {
    pub dest: PathBuf,
    pub moved: Vec<ArtifactKind>,
}

impl CollectedArtifacts {
    pub fn has(&self, kind: ArtifactKind) -> bool {
        self.moved.contains(&kind)
    }
}

// REFUSE TO RUN A CELL INTO A WORK DIRECTORY THAT STILL HOLDS ARTIFACTS.
// A LEFTOVER FROM A CRASHED RUN WOULD OTHERWISE BE ATTRIBUTED TO THIS CELL.
pub fn ensure_clean(cell: &SweepCell, workdir: &Path) -> Result<(), SweepError> {
    for kind in ArtifactKind::ALL {
        let path = workdir.join(kind.source_name());
        if path.exists() {
            return Err(SweepError::StaleArtifact { cell: cell.clone(), path });
        }
    }
    Ok(())
}

pub fn collect(cell: &SweepCell, workdir: &Path, dest: &Path) -> Result<CollectedArtifacts, SweepError> {
    // VERIFY EVERYTHING BEFORE MOVING ANYTHING
    for kind in ArtifactKind::ALL.iter().filter(|k| k.required()) {
        let path = workdir.join(kind.source_name());
        if !path.is_file() {
            return Err(SweepError::MissingArtifact { cell: cell.clone(), path });
        }
    }

    fs::create_dir_all(dest).map_err(|e| SweepError::io(dest, e))?;

    let mut moved = Vec::with_capacity(ArtifactKind::ALL.len());
    for kind in ArtifactKind::ALL {
        let from = workdir.join(kind.source_name());
        let to = dest.join(kind.dest_name());
        if !kind.required() && !from.is_file() {
            debug!("[{}] no {} produced", cell, kind.source_name());
            // A COPY FROM AN EARLIER SWEEP INTO THE SAME ROOT MUST NOT SURVIVE
            if to.is_file() {
                fs::remove_file(&to).map_err(|e| SweepError::io(&to, e))?;
            }
            continue;
        }
        move_file(&from, &to).map_err(|e| SweepError::io(&from, e))?;
        debug!("[{}] {} -> {}", cell, from.display(), to.display());
        moved.push(kind);
    }

    Ok(CollectedArtifacts { dest: dest.to_path_buf(), moved })
}

// rename, OR copy + remove ACROSS FILESYSTEMS. EITHER WAY THE SOURCE IS GONE.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}
