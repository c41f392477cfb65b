// SUMMARY EXTRACTION
// PARSES THE WORKLOAD'S key: value SUMMARY AND WRITES summary_matrix.tsv,
// ONE ROW PER RELOCATED SUMMARY UNDER THE OUTPUT ROOT.
//
// THE SUMMARY FORMAT IS A FIXED CONTRACT WITH THE WORKLOAD. A MISSING
// REQUIRED FIELD IS AN ERROR, NOT A SKIP.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::artifacts::SUMMARY_FILE;
use crate::error::SweepError;

pub const MATRIX_FILE: &str = "summary_matrix.tsv";

pub const EVENTS_TOTAL: &str = "events_total";
pub const ABORTS: &str = "aborts";
pub const IDLE_TOTAL_US: &str = "idle_total_us";
pub const BYTES_H2D: &str = "bytes_h2d";
pub const BYTES_D2H: &str = "bytes_d2h";

#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub key: &'static str,
    pub required: bool,
}

pub const FIELDS: [FieldSpec; 5] = [
    FieldSpec { key: EVENTS_TOTAL, required: true },
    FieldSpec { key: ABORTS, required: true },
    FieldSpec { key: IDLE_TOTAL_US, required: false },
    FieldSpec { key: BYTES_H2D, required: false },
    FieldSpec { key: BYTES_D2H, required: false },
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("required field `{0}` not found")]
    MissingField(&'static str),

    #[error("field `{field}` has non-numeric value {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SummaryRecord {
    pub events_total: u64,
    pub aborts: u64,
    pub idle_total_us: Option<u64>,
    pub bytes_h2d: Option<u64>,
    pub bytes_d2h: Option<u64>,
}

fn line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(\S*)").expect("static regex")
    })
}

// FIRST OCCURRENCE OF A KEY WINS. UNKNOWN KEYS AND NON key: value LINES ARE IGNORED.
// THE VALUE IS THE FIRST TOKEN AFTER THE COLON.
pub fn parse_summary(text: &str) -> Result<SummaryRecord, ParseError> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for line in text.lines() {
        if let Some(caps) = line_re().captures(line) {
            let key = caps.get(1).map_or("", |m| m.as_str());
            let value = caps.get(2).map_or("", |m| m.as_str());
            seen.entry(key).or_insert(value);
        }
    }

    let mut values: HashMap<&'static str, u64> = HashMap::new();
    for field in FIELDS {
        match seen.get(field.key) {
            Some(raw) => {
                let n = raw.parse::<u64>().map_err(|_| ParseError::InvalidNumber {
                    field: field.key,
                    value: raw.to_string(),
                })?;
                values.insert(field.key, n);
            }
            None if field.required => return Err(ParseError::MissingField(field.key)),
            None => {}
        }
    }

    Ok(SummaryRecord {
        events_total: values[EVENTS_TOTAL],
        aborts: values[ABORTS],
        idle_total_us: values.get(IDLE_TOTAL_US).copied(),
        bytes_h2d: values.get(BYTES_H2D).copied(),
        bytes_d2h: values.get(BYTES_D2H).copied(),
    })
}

pub fn read_summary(path: &Path) -> Result<SummaryRecord, SweepError> {
    let text = fs::read_to_string(path).map_err(|e| SweepError::io(path, e))?;
    parse_summary(&text).map_err(|source| SweepError::Parse { path: path.to_path_buf(), source })
}

// ---------------------------------------------------------------------------
// DISCOVERY
// ---------------------------------------------------------------------------

// EVERY summary.txt BELOW root, SORTED BY PATH. DOT-DIRECTORIES (WORK DIRS
// KEPT AFTER A FAILED CELL) ARE NOT ENTERED.
pub fn find_summaries(root: &Path) -> Result<Vec<PathBuf>, SweepError> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = fs::read_dir(&dir).map_err(|e| SweepError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| SweepError::io(&dir, e))?;
            let ft = entry.file_type().map_err(|e| SweepError::io(entry.path(), e))?;
            let name = entry.file_name();
            if ft.is_dir() {
                if !name.to_string_lossy().starts_with('.') {
                    stack.push(entry.path());
                }
            } else if ft.is_file() && name == SUMMARY_FILE {
                found.push(entry.path());
            }
        }
    }
    found.sort();
    Ok(found)
}

// ---------------------------------------------------------------------------
// MATRIX TABLE
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatrixRow {
    pub path: PathBuf,
    pub events: u64,
    pub aborts: u64,
}

pub fn extract_matrix(root: &Path) -> Result<Vec<MatrixRow>, SweepError> {
    find_summaries(root)?
        .into_iter()
        .map(|path| {
            let rec = read_summary(&path)?;
            Ok(MatrixRow { path, events: rec.events_total, aborts: rec.aborts })
        })
        .collect()
}

pub fn format_matrix(rows: &[MatrixRow]) -> String {
    let mut out = String::from("path\tevents\taborts\n");
    for r in rows {
        out.push_str(&format!("{}\t{}\t{}\n", r.path.display(), r.events, r.aborts));
    }
    out
}

pub fn write_matrix(root: &Path) -> Result<(PathBuf, Vec<MatrixRow>), SweepError> {
    let rows = extract_matrix(root)?;
    let path = root.join(MATRIX_FILE);
    fs::write(&path, format_matrix(&rows)).map_err(|e| SweepError::io(&path, e))?;
    Ok((path, rows))
}
