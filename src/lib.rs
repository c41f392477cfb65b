// ABORTSWEEP -- MEASUREMENT SWEEP HARNESS FOR THE STM ABORT WORKLOAD
// RUNS THE WORKLOAD ACROSS A (CONFLICT x THREADS) MATRIX, ONE PROCESS AT A TIME,
// PINNED AND PRIORITIZED. RELOCATES ITS ARTIFACTS PER CELL, THEN AGGREGATES
// THE SUMMARIES INTO A MATRIX TABLE AND A RATE TABLE.
//
// PIPELINE (LEAF FIRST):
//   affinity  -> invoke  -> artifacts  -> sweep  -> summary  -> rates

pub mod affinity;
pub mod artifacts;
pub mod error;
pub mod invoke;
pub mod params;
pub mod rates;
pub mod summary;
pub mod sweep;

pub use error::SweepError;
pub use params::{SweepCell, SweepParameters};
