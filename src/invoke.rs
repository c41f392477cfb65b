// WORKLOAD INVOCATION
// SPAWNS ONE WORKLOAD PROCESS PER CELL WITH ELEVATED PRIORITY AND A CPU MASK,
// BLOCKS UNTIL IT EXITS. THE WORKLOAD WRITES ITS ARTIFACTS INTO ITS CWD;
// NOTHING HERE READS THEM.
//
// WITHOUT A TIMEOUT A HUNG WORKLOAD HANGS THE WHOLE SWEEP.

use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::affinity::{apply_cpu_set, CpuMask};
use crate::error::SweepError;
use crate::params::{SweepCell, SweepParameters};

// nice -n -20
pub const DEFAULT_NICE: i32 = -20;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const KILL_GRACE: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Isolation {
    // NICENESS FOR THE CHILD. NEGATIVE VALUES NEED CAP_SYS_NICE.
    pub nice: Option<i32>,
    pub pin_cpus: bool,
}

impl Default for Isolation {
    fn default() -> Self {
        Self { nice: Some(DEFAULT_NICE), pin_cpus: true }
    }
}

impl Isolation {
    pub fn none() -> Self {
        Self { nice: None, pin_cpus: false }
    }
}

#[derive(Clone, Debug)]
pub struct RunInvoker {
    program: PathBuf,
    // PASSED BEFORE --threads/--conflict/--ops/--seed
    leading_args: Vec<String>,
    isolation: Isolation,
    timeout: Option<Duration>,
}

impl RunInvoker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            isolation: Isolation::default(),
            timeout: None,
        }
    }

    pub fn leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    // THE CHILD RUNS IN workdir, SO A RELATIVE PATH LIKE target/release/x MUST
    // BE ANCHORED TO OUR CWD FIRST. BARE NAMES STILL GO THROUGH $PATH.
    fn resolved_program(&self) -> PathBuf {
        if self.program.is_relative() && self.program.components().count() > 1 {
            if let Ok(cwd) = std::env::current_dir() {
                return cwd.join(&self.program);
            }
        }
        self.program.clone()
    }

    pub fn command(&self, cell: &SweepCell, params: &SweepParameters, workdir: &Path) -> Command {
        let mut cmd = Command::new(self.resolved_program());
        cmd.args(&self.leading_args)
            .args(cell.workload_args(params))
            .current_dir(workdir)
            .stdin(Stdio::null());

        if self.timeout.is_some() {
            // OWN GROUP SO A TIMEOUT CAN TAKE DOWN THE WORKLOAD'S CHILDREN TOO
            cmd.process_group(0);
        }

        let nice = self.isolation.nice;
        let cpu_set = if self.isolation.pin_cpus {
            Some(CpuMask::first_n(cell.threads).to_cpu_set())
        } else {
            None
        };

        if nice.is_some() || cpu_set.is_some() {
            // RUNS BETWEEN fork AND exec: SYSCALLS ONLY, NO ALLOCATION
            unsafe {
                cmd.pre_exec(move || {
                    if let Some(n) = nice {
                        if libc::setpriority(libc::PRIO_PROCESS, 0, n) != 0 {
                            return Err(std::io::Error::last_os_error());
                        }
                    }
                    if let Some(set) = cpu_set.as_ref() {
                        apply_cpu_set(set)?;
                    }
                    Ok(())
                });
            }
        }
        cmd
    }

    pub fn run(
        &self,
        cell: &SweepCell,
        params: &SweepParameters,
        workdir: &Path,
    ) -> Result<(), SweepError> {
        let mask = CpuMask::first_n(cell.threads);
        info!(
            "[{}] launching {} (mask {}, nice {})",
            cell,
            self.program.display(),
            if self.isolation.pin_cpus { mask.to_hex() } else { "unpinned".into() },
            self.isolation.nice.map(|n| n.to_string()).unwrap_or_else(|| "inherited".into()),
        );

        let mut cmd = self.command(cell, params, workdir);
        debug!("[{}] {:?} in {}", cell, cmd, workdir.display());

        let child = cmd.spawn().map_err(|source| SweepError::Launch {
            cell: cell.clone(),
            program: self.program.clone(),
            source,
        })?;

        let status = match self.timeout {
            None => wait_blocking(child, cell, &self.program)?,
            Some(timeout) => wait_with_deadline(child, cell, &self.program, timeout)?,
        };

        if !status.success() {
            return Err(SweepError::WorkloadFailed { cell: cell.clone(), status });
        }
        Ok(())
    }
}

fn wait_blocking(mut child: Child, cell: &SweepCell, program: &Path) -> Result<ExitStatus, SweepError> {
    child.wait().map_err(|source| SweepError::Launch {
        cell: cell.clone(),
        program: program.to_path_buf(),
        source,
    })
}

fn wait_with_deadline(
    mut child: Child,
    cell: &SweepCell,
    program: &Path,
    timeout: Duration,
) -> Result<ExitStatus, SweepError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => break,
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(source) => {
                return Err(SweepError::Launch {
                    cell: cell.clone(),
                    program: program.to_path_buf(),
                    source,
                })
            }
        }
    }

    warn!("[{}] timed out after {:?}, killing process group", cell, timeout);
    kill_group(&mut child);
    Err(SweepError::Timeout { cell: cell.clone(), timeout })
}

// SIGTERM, SHORT GRACE, THEN SIGKILL. ALWAYS REAPS.
fn kill_group(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    unsafe { libc::killpg(pgid, libc::SIGTERM); }
    let grace_end = Instant::now() + KILL_GRACE;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) if Instant::now() >= grace_end => break,
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(_) => break,
        }
    }
    unsafe { libc::killpg(pgid, libc::SIGKILL); }
    let _ = child.wait();
}
