//! Echo Benchmark Library
//!
//! This library drives load against an echo RPC server and distills each run
//! into tail latency, call rate and throughput numbers. Its unit of work is
//! the sweep: a series of fixed-duration load runs that vary one tuning
//! dimension (worker parallelism, request size or streaming chunk size) and
//! export one CSV row per step.
//!
//! ## Architecture
//!
//! - `cli`: command-line surface and sweep/shape dispatch
//! - `config`: resolved per-run configuration and validation
//! - `recorder`: concurrent latency aggregation, percentiles and QPS
//! - `transport`: connection ownership, single channel or fan-out group
//! - `worker`: per-shape call loops and byte accounting
//! - `run`: one fixed-duration load run over a worker fleet
//! - `sweep`: value generation, the step loop and CSV export
//! - `shutdown`: the Ctrl-C quit token polled between steps

pub mod cli;
pub mod config;
pub mod recorder;
pub mod run;
pub mod series;
pub mod shutdown;
pub mod sweep;
pub mod transport;
pub mod types;
pub mod worker;

pub use cli::Cli;
pub use config::{BenchConfig, TrafficShape};
pub use recorder::LatencyRecorder;
pub use run::LoadRun;
pub use series::{ResultRow, ResultSeries};
pub use shutdown::{install_ctrlc, QuitToken};
pub use sweep::{
    run_step, run_sweep, sweep_chunk_size, sweep_parallelism, sweep_req_size, SweepDimension,
};
pub use transport::TransportGroup;
pub use types::{BenchError, BenchResult};
pub use worker::Worker;

/// Initialize logging for the benchmark binary
///
/// Sets up timestamped console logging at info level with module paths
/// suppressed, so sweep progress lines stay on one line each.
pub fn init_logging() -> BenchResult<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .map_err(|e| BenchError::Initialization(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}
