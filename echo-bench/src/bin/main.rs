//! Echo Benchmark Harness
//!
//! Drives sweep-based load tests against an echo RPC server and exports one
//! CSV series per sweep dimension and traffic shape.
//!
//! ## Usage
//!
//! ### Parallelism sweep over the unary shapes
//! ```bash
//! cargo run --bin echo-bench -- --for-parallelism --server 127.0.0.1:8002
//! ```
//!
//! ### Request-size sweep up to 1 GiB
//! ```bash
//! cargo run --bin echo-bench -- --for-req-size --req-size 1073741824
//! ```
//!
//! ### Chunk-size sweep for the streaming shapes
//! ```bash
//! cargo run --bin echo-bench -- --for-chunk-size --test-sstreaming true
//! ```
//!
//! Ctrl-C stops at the next sweep step and the rows collected so far are
//! still written out.

use clap::Parser;
use echo_bench::{
    cli::Cli,
    init_logging, install_ctrlc,
    shutdown::QuitToken,
    sweep::{sweep_chunk_size, sweep_parallelism, sweep_req_size, SweepDimension},
    types::{BenchError, BenchResult},
};
use log::{error, info, warn};

fn main() -> BenchResult<()> {
    init_logging()?;

    info!("Starting Echo Benchmark Harness");

    let cli = Cli::parse();
    let quit = QuitToken::new();
    install_ctrlc(&quit)?;

    let result = run_benchmarks(&cli, &quit);

    if let Err(ref e) = result {
        error!("Benchmark failed: {e}");

        match e {
            BenchError::Configuration(_) => {
                error!("Please check the flag combination; streaming shapes need the framed protocol and a single connection");
            }
            BenchError::Transport(_) => {
                error!("Please ensure the echo server is running and reachable at the configured address");
            }
            BenchError::Io(_) => {
                error!("Please check that the output directory is writable");
            }
            _ => {}
        }

        std::process::exit(1);
    }

    info!("Echo Benchmark Harness completed successfully");
    Ok(())
}

fn run_benchmarks(cli: &Cli, quit: &QuitToken) -> BenchResult<()> {
    let base = cli.build_config()?;

    let dimensions = cli.dimensions();
    if dimensions.is_empty() {
        warn!("no sweep selected; pass --for-parallelism, --for-req-size or --for-chunk-size");
        return Ok(());
    }

    for dimension in dimensions {
        if quit.is_set() {
            break;
        }
        for shape in cli.shapes_for(dimension) {
            if quit.is_set() {
                break;
            }
            let mut cfg = base.clone();
            cfg.shape = shape;
            info!("=== {} sweep, {} shape ===", dimension.tag(), shape.label());
            match dimension {
                SweepDimension::Parallelism => sweep_parallelism(&cfg, quit)?,
                SweepDimension::ReqSize => sweep_req_size(&cfg, quit)?,
                SweepDimension::ChunkSize => sweep_chunk_size(&cfg, quit)?,
            };
        }
    }
    Ok(())
}
