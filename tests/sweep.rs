// ABORTSWEEP END-TO-END TESTS
// DRIVES THE LIBRARY WITH A /bin/sh STUB IN PLACE OF THE STM WORKLOAD.
// NO ROOT, NO PINNING, NO PRIORITY CHANGES. RUN OFFLINE.

use std::fs;
use std::path::{Path, PathBuf};

use abortsweep::artifacts::ArtifactKind;
use abortsweep::invoke::{Isolation, RunInvoker};
use abortsweep::params::{SweepCell, SweepParameters};
use abortsweep::rates::collect_rates;
use abortsweep::summary::{extract_matrix, MATRIX_FILE};
use abortsweep::sweep::{aggregate, SweepController};
use abortsweep::SweepError;

// ---------------------------------------------------------------------------
// STUB WORKLOAD
// ---------------------------------------------------------------------------

// PARSES THE FOUR STANDARD ARGUMENTS INTO $T $C $O $S, THEN RUNS body
fn stub(body: &str) -> RunInvoker {
    let script = format!(
        r#"while [ $# -gt 0 ]; do
  case "$1" in
    --threads) T=$2; shift ;;
    --conflict) C=$2; shift ;;
    --ops) O=$2; shift ;;
    --seed) S=$2; shift ;;
  esac
  shift
done
{}"#,
        body
    );
    RunInvoker::new("/bin/sh")
        .leading_args(["-c".to_string(), script, "stm_abort".to_string()])
        .isolation(Isolation::none())
}

const ABORT_TABLE: &str = r#"printf 'abort_token,cause,count,retries_avg,conflict_avg,conflict_min,conflict_max,first_us,last_us\nstm,conflict,%s,1.000,1.000,1,1,10,20\n' "$A" > memtrace_abort.csv"#;

fn fixed_workload() -> RunInvoker {
    stub(&format!(
        "A=250\n{}\nprintf 'events_total: 1000000\\nidle_total_us: 0\\nbytes_h2d: 0\\nbytes_d2h: 0\\naborts: 250\\n' > memtrace_summary.txt",
        ABORT_TABLE
    ))
}

// aborts = threads * 100, events = ops, BOTH LOGS ONLY FOR conflict=high
fn varying_workload() -> RunInvoker {
    stub(&format!(
        r#"A=$((T * 100))
{}
printf 'events_total: %s\nidle_total_us: 5\nbytes_h2d: 0\nbytes_d2h: 0\naborts: %s\n' "$O" "$A" > memtrace_summary.txt
if [ "$C" = high ]; then
  printf 't_start_us,t_end_us,bytes,dir,idle_us,abort_token,phase\n' > memtrace.csv
  printf 'tx_id,cause,retries,conflict_sz,t_start_us,t_end_us,abort_token\n' > memtrace_abort_full.csv
fi"#,
        ABORT_TABLE
    ))
}

fn params(root: &Path, threads: &[usize], conflicts: &[&str]) -> SweepParameters {
    SweepParameters {
        threads: threads.to_vec(),
        conflicts: conflicts.iter().map(|s| s.to_string()).collect(),
        out_root: root.to_path_buf(),
        ..SweepParameters::default()
    }
}

fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ---------------------------------------------------------------------------
// END TO END
// ---------------------------------------------------------------------------

#[test]
fn two_by_two_matrix_rate_table() {
    let root = tempfile::tempdir().unwrap();
    let p = params(root.path(), &[2, 4], &["low", "high"]);
    let ops = p.ops;

    let outcome = SweepController::new(p, fixed_workload()).unwrap().run().unwrap();
    // EXECUTION ORDER FOLLOWS THE DECLARED LABEL ORDER
    let executed: Vec<SweepCell> = outcome.cells.iter().map(|c| c.cell.clone()).collect();
    assert_eq!(executed, vec![
        SweepCell::new("low", 2),
        SweepCell::new("low", 4),
        SweepCell::new("high", 2),
        SweepCell::new("high", 4),
    ]);

    let agg = aggregate(root.path(), ops).unwrap();
    let text = fs::read_to_string(&agg.rates_path).unwrap();
    // TABLE ORDER IS LEXICOGRAPHIC BY LABEL, THEN NUMERIC BY THREADS
    assert_eq!(
        text,
        "conflict\tthreads\tevents\taborts\trate\n\
         high\t2\t1000000\t250\t0.000250\n\
         high\t4\t1000000\t250\t0.000250\n\
         low\t2\t1000000\t250\t0.000250\n\
         low\t4\t1000000\t250\t0.000250\n"
    );
}

#[test]
fn every_cell_gets_exactly_its_artifacts() {
    let root = tempfile::tempdir().unwrap();
    let p = params(root.path(), &[1, 3], &["low", "high"]);
    let outcome = SweepController::new(p, varying_workload()).unwrap().run().unwrap();
    assert_eq!(outcome.cells.len(), 4);

    for t in [1, 3] {
        let low = root.path().join("low").join(format!("t{}", t));
        assert_eq!(dir_names(&low), vec!["abort.csv", "summary.txt"]);

        let high = root.path().join("high").join(format!("t{}", t));
        assert_eq!(
            dir_names(&high),
            vec!["abort.csv", "abort_full.csv", "memtrace.csv", "summary.txt"]
        );
    }

    for result in &outcome.cells {
        let high = result.cell.conflict == "high";
        assert_eq!(result.artifacts.has(ArtifactKind::EventLog), high);
        assert_eq!(result.artifacts.has(ArtifactKind::AbortLog), high);
    }

    // ONLY THE CELL DIRECTORIES REMAIN UNDER THE ROOT
    assert_eq!(dir_names(root.path()), vec!["high", "low"]);
}

#[test]
fn artifacts_are_not_mixed_between_cells() {
    let root = tempfile::tempdir().unwrap();
    let p = params(root.path(), &[1, 2, 5], &["med"]);
    SweepController::new(p, varying_workload()).unwrap().run().unwrap();

    for t in [1usize, 2, 5] {
        let abort = fs::read_to_string(root.path().join(format!("med/t{}/abort.csv", t))).unwrap();
        assert!(abort.contains(&format!("stm,conflict,{},", t * 100)), "t={}: {}", t, abort);
    }
}

#[test]
fn hidden_label_is_refused_before_any_run() {
    let root = tempfile::tempdir().unwrap();
    let p = params(root.path(), &[2], &["low", ".hi"]);
    let err = SweepController::new(p, fixed_workload()).err().expect("label accepted");
    assert!(matches!(err, SweepError::InvalidParameters(_)));
    assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
}

// ---------------------------------------------------------------------------
// FAIL-FAST
// ---------------------------------------------------------------------------

#[test]
fn missing_artifact_stops_sweep_at_failing_cell() {
    let root = tempfile::tempdir().unwrap();
    let calls = tempfile::NamedTempFile::new().unwrap();
    let body = format!(
        r#"echo "$C $T" >> '{}'
A=1
{}
if [ "$C" != high ] || [ "$T" != 2 ]; then
  printf 'events_total: 10\naborts: 1\n' > memtrace_summary.txt
fi"#,
        calls.path().display(),
        ABORT_TABLE
    );
    let p = params(root.path(), &[2, 4], &["low", "high"]);

    let err = SweepController::new(p, stub(&body)).unwrap().run().unwrap_err();
    match &err {
        SweepError::MissingArtifact { cell, path } => {
            assert_eq!(cell, &SweepCell::new("high", 2));
            assert!(path.ends_with("memtrace_summary.txt"));
        }
        other => panic!("unexpected error: {other}"),
    }
    let msg = err.to_string();
    assert!(msg.contains("conflict=high") && msg.contains("threads=2"), "{}", msg);

    // (high, 4) WAS NEVER STARTED
    let invoked = fs::read_to_string(calls.path()).unwrap();
    assert_eq!(invoked, "low 2\nlow 4\nhigh 2\n");
    assert!(!root.path().join("high/t4").exists());
    assert!(root.path().join("low/t4/summary.txt").is_file());
}

#[test]
fn failing_workload_stops_sweep() {
    let root = tempfile::tempdir().unwrap();
    let p = params(root.path(), &[1, 2], &["low"]);
    let err = SweepController::new(p, stub("exit 7")).unwrap().run().unwrap_err();

    match &err {
        SweepError::WorkloadFailed { cell, status } => {
            assert_eq!(cell, &SweepCell::new("low", 1));
            assert_eq!(status.code(), Some(7));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!root.path().join("low/t2").exists());
}

// ---------------------------------------------------------------------------
// AGGREGATION
// ---------------------------------------------------------------------------

#[test]
fn matrix_and_rates_agree_per_cell() {
    let root = tempfile::tempdir().unwrap();
    let p = params(root.path(), &[1, 2, 4], &["low", "med"]);
    let ops = p.ops;
    SweepController::new(p, varying_workload()).unwrap().run().unwrap();
    let agg = aggregate(root.path(), ops).unwrap();

    assert_eq!(agg.matrix.len(), agg.rates.len());
    for row in &agg.rates {
        let path: PathBuf = root
            .path()
            .join(&row.conflict)
            .join(format!("t{}", row.threads))
            .join("summary.txt");
        let m = agg.matrix.iter().find(|m| m.path == path).expect("matrix row for cell");
        assert_eq!(m.events, row.events);
        assert_eq!(m.aborts, row.aborts);
        assert_eq!(row.aborts, row.threads as u64 * 100);
    }

    // THE WRITTEN MATRIX FILE CARRIES THE SAME NUMBERS
    let text = fs::read_to_string(root.path().join(MATRIX_FILE)).unwrap();
    for m in &agg.matrix {
        let line = format!("{}\t{}\t{}", m.path.display(), m.events, m.aborts);
        assert!(text.lines().any(|l| l == line), "missing {}", line);
    }
}

#[test]
fn rate_uses_ops_of_the_run() {
    let root = tempfile::tempdir().unwrap();
    let mut p = params(root.path(), &[2], &["low"]);
    p.ops = 40_000;
    SweepController::new(p, varying_workload()).unwrap().run().unwrap();

    let rows = collect_rates(root.path(), 40_000).unwrap();
    assert_eq!(rows.len(), 1);
    // events_total ECHOES --ops, aborts = 200
    assert_eq!(rows[0].events, 40_000);
    assert_eq!(rows[0].rate, 200.0 / 40_000.0);
}

#[test]
fn stray_notes_directory_is_ignored() {
    let root = tempfile::tempdir().unwrap();
    let p = params(root.path(), &[2], &["low"]);
    let ops = p.ops;
    SweepController::new(p, fixed_workload()).unwrap().run().unwrap();

    fs::create_dir_all(root.path().join("notes")).unwrap();
    fs::write(root.path().join("notes/summary.txt"), "events_total: 1\naborts: 1\n").unwrap();

    let rows = collect_rates(root.path(), ops).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!((rows[0].conflict.as_str(), rows[0].threads), ("low", 2));

    // THE MATRIX STAGE HAS NO SUCH FILTER
    assert_eq!(extract_matrix(root.path()).unwrap().len(), 2);
}

#[test]
fn rerun_overwrites_previous_results() {
    let root = tempfile::tempdir().unwrap();
    let p = params(root.path(), &[2], &["low"]);
    SweepController::new(p.clone(), fixed_workload()).unwrap().run().unwrap();
    SweepController::new(p, varying_workload()).unwrap().run().unwrap();

    let rows = collect_rates(root.path(), 1_000_000).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].aborts, 200);
}
