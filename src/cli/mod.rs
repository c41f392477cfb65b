pub mod aggregate;
pub mod check;
pub mod mask;
pub mod run;

// cargo build --release --example stm_abort --features memtrace
pub const DEFAULT_WORKLOAD: &str = "target/release/examples/stm_abort";
