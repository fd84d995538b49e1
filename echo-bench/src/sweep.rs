//! Sweep controllers.
//!
//! Each sweep varies one configuration field across a generated value
//! sequence, runs one [`LoadRun`] per value and appends one result row per
//! completed step. The quit signal is polled at step boundaries only, so a
//! step that has started always runs to completion. Whatever rows exist
//! when the loop ends are exported.

use std::path::PathBuf;

use log::info;

use crate::config::BenchConfig;
use crate::run::LoadRun;
use crate::series::{ResultRow, ResultSeries};
use crate::shutdown::QuitToken;
use crate::types::BenchResult;

/// Smallest request or chunk size any sweep starts from.
pub const SIZE_FLOOR: u64 = 256;
/// Log-spaced steps a request-size sweep aims for.
const REQ_SIZE_STEPS: u32 = 40;
/// Additive steps a chunk-size sweep aims for.
const CHUNK_SIZE_STEPS: u64 = 20;
/// Parallelism increment between steps.
const PARALLELISM_STEP: u64 = 4;

/// Which configuration field a sweep varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDimension {
    Parallelism,
    ReqSize,
    ChunkSize,
}

impl SweepDimension {
    /// Short tag used in result file names and log lines.
    pub const fn tag(self) -> &'static str {
        match self {
            SweepDimension::Parallelism => "parallel",
            SweepDimension::ReqSize => "req-size",
            SweepDimension::ChunkSize => "chunk-size",
        }
    }
}

/// Parallelism steps: 1, 5, 9, ... up to and including `max`.
pub fn parallelism_values(max: usize) -> Vec<u64> {
    let mut values = Vec::new();
    let mut value = 1u64;
    while value <= max as u64 {
        values.push(value);
        value += PARALLELISM_STEP;
    }
    values
}

/// Request sizes log-spaced from the floor to `max` in about forty steps.
///
/// Each raw value is rounded to the nearest byte; rounding collisions at
/// the small end collapse into one step. A `max` at or below the floor
/// degenerates to a single step at the floor.
pub fn req_size_values(max: usize) -> Vec<u64> {
    let floor = SIZE_FLOOR as f64;
    let max = max as f64;
    let ratio = (max / floor).powf(1.0 / f64::from(REQ_SIZE_STEPS));
    let mut values = Vec::new();
    let mut raw = floor;
    while raw <= max {
        let rounded = raw.round() as u64;
        if values.last() != Some(&rounded) {
            values.push(rounded);
        }
        if ratio <= 1.0 {
            break;
        }
        raw *= ratio;
    }
    if values.is_empty() {
        values.push(SIZE_FLOOR);
    }
    values
}

/// Chunk sizes from the floor to `max` in about twenty additive steps.
pub fn chunk_size_values(max: usize) -> Vec<u64> {
    let max = max as u64;
    let gap = max.saturating_sub(SIZE_FLOOR) / CHUNK_SIZE_STEPS + 1;
    let mut values = Vec::new();
    let mut value = SIZE_FLOOR;
    while value <= max {
        values.push(value);
        value += gap;
    }
    if values.is_empty() {
        values.push(SIZE_FLOOR);
    }
    values
}

/// Aggregates read off one completed load run.
#[derive(Debug, Clone, Copy)]
pub struct StepStats {
    pub latency_ms: f64,
    pub qps: f64,
    pub mbps: f64,
    pub calls_ok: u64,
    pub calls_failed: u64,
}

/// Runs one load run to completion and reduces it to a result row's worth
/// of numbers. Tail latency is p99 over the run's microsecond samples,
/// throughput is upload bytes over the configured duration.
pub fn run_step(cfg: BenchConfig) -> BenchResult<StepStats> {
    let duration = cfg.duration;
    let mut run = LoadRun::new(cfg)?;
    run.start();
    run.join();
    Ok(StepStats {
        latency_ms: run.recorder().percentile(0.99) as f64 / 1e3,
        qps: run.recorder().qps(duration),
        mbps: run.sent_bps() / f64::from(1u32 << 20),
        calls_ok: run.calls_ok(),
        calls_failed: run.calls_failed(),
    })
}

/// Shared sweep skeleton: walk `values`, run `step` for each, collect rows.
///
/// Stopping on a set quit token is not an error; the series keeps the rows
/// collected so far. A failed step aborts the sweep and surfaces its error.
pub fn run_sweep<F>(
    dimension: SweepDimension,
    values: &[u64],
    quit: &QuitToken,
    mut step: F,
) -> BenchResult<ResultSeries>
where
    F: FnMut(u64) -> BenchResult<StepStats>,
{
    let mut series = ResultSeries::new();
    for &value in values {
        if quit.is_set() {
            info!(
                "quit requested, stopping {} sweep after {} rows",
                dimension.tag(),
                series.len()
            );
            break;
        }
        let stats = step(value)?;
        if stats.calls_failed == 0 {
            info!(
                "  {} {:>6}: p99 {:.2}ms, qps {:.0}, speed {:.2}MB/s",
                dimension.tag(),
                value,
                stats.latency_ms,
                stats.qps,
                stats.mbps
            );
        } else {
            info!(
                "  {} {:>6}: p99 {:.2}ms, qps {:.0}, speed {:.2}MB/s, {} calls failed",
                dimension.tag(),
                value,
                stats.latency_ms,
                stats.qps,
                stats.mbps,
                stats.calls_failed
            );
        }
        series.push(ResultRow {
            x: value,
            latency_ms: stats.latency_ms,
            mbps: stats.mbps,
            qps: stats.qps,
        });
    }
    Ok(series)
}

/// Sweeps worker parallelism from 1 up to the configured value.
pub fn sweep_parallelism(cfg: &BenchConfig, quit: &QuitToken) -> BenchResult<PathBuf> {
    let values = parallelism_values(cfg.parallelism);
    let label = parallelism_label(cfg);
    info!("{label}");
    let series = run_sweep(SweepDimension::Parallelism, &values, quit, |value| {
        let mut step_cfg = cfg.clone();
        step_cfg.parallelism = value as usize;
        run_step(step_cfg)
    })?;
    export(&series, cfg, SweepDimension::Parallelism, &label)
}

/// Sweeps the request size from the floor up to the configured value.
pub fn sweep_req_size(cfg: &BenchConfig, quit: &QuitToken) -> BenchResult<PathBuf> {
    let values = req_size_values(cfg.req_size);
    let label = req_size_label(cfg);
    info!("{label}");
    let series = run_sweep(SweepDimension::ReqSize, &values, quit, |value| {
        let mut step_cfg = cfg.clone();
        step_cfg.req_size = value as usize;
        run_step(step_cfg)
    })?;
    export(&series, cfg, SweepDimension::ReqSize, &label)
}

/// Sweeps the streaming chunk size from the floor up to the configured
/// value.
pub fn sweep_chunk_size(cfg: &BenchConfig, quit: &QuitToken) -> BenchResult<PathBuf> {
    let values = chunk_size_values(cfg.chunk_size);
    let label = chunk_size_label(cfg);
    info!("{label}");
    let series = run_sweep(SweepDimension::ChunkSize, &values, quit, |value| {
        let mut step_cfg = cfg.clone();
        step_cfg.chunk_size = value as usize;
        run_step(step_cfg)
    })?;
    export(&series, cfg, SweepDimension::ChunkSize, &label)
}

fn export(
    series: &ResultSeries,
    cfg: &BenchConfig,
    dimension: SweepDimension,
    label: &str,
) -> BenchResult<PathBuf> {
    let path = series.write_csv(&cfg.output_dir, dimension.tag(), label)?;
    info!("wrote {}", path.display());
    Ok(path)
}

fn parallelism_label(cfg: &BenchConfig) -> String {
    with_user_label(
        cfg,
        format!(
            "{}_reqsz({})_para(1-{})_chunksz({})_prot({})",
            cfg.shape.label(),
            short_size(cfg.req_size as u64),
            cfg.parallelism,
            short_size(cfg.chunk_size as u64),
            cfg.protocol.name()
        ),
    )
}

fn req_size_label(cfg: &BenchConfig) -> String {
    with_user_label(
        cfg,
        format!(
            "{}_reqsz({}-{})_para({})_chunksz({})_prot({})_stream({},{})",
            cfg.shape.label(),
            short_size(SIZE_FLOOR),
            short_size(cfg.req_size as u64),
            cfg.parallelism,
            short_size(cfg.chunk_size as u64),
            cfg.protocol.name(),
            cfg.stream_batch,
            short_size(cfg.stream_buf_bytes as u64)
        ),
    )
}

fn chunk_size_label(cfg: &BenchConfig) -> String {
    with_user_label(
        cfg,
        format!(
            "{}_reqsz({})_para({})_chunksz({}-{})_prot({})",
            cfg.shape.label(),
            short_size(cfg.req_size as u64),
            cfg.parallelism,
            short_size(SIZE_FLOOR),
            short_size(cfg.chunk_size as u64),
            cfg.protocol.name()
        ),
    )
}

fn with_user_label(cfg: &BenchConfig, base: String) -> String {
    if cfg.label.is_empty() {
        base
    } else {
        format!("{}_{}", cfg.label, base)
    }
}

/// Renders byte counts the way they read in file names: exact binary
/// multiples collapse to `k`/`m`/`g`, everything else stays decimal.
fn short_size(bytes: u64) -> String {
    const K: u64 = 1 << 10;
    const M: u64 = 1 << 20;
    const G: u64 = 1 << 30;
    if bytes >= G && bytes % G == 0 {
        format!("{}g", bytes / G)
    } else if bytes >= M && bytes % M == 0 {
        format!("{}m", bytes / M)
    } else if bytes >= K && bytes % K == 0 {
        format!("{}k", bytes / K)
    } else {
        bytes.to_string()
    }
}
