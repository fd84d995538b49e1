//! Command-line interface definitions for the echo benchmark harness

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use echo_client::{LbPolicy, Protocol, RpcError};

use crate::config::{BenchConfig, TrafficShape};
use crate::sweep::SweepDimension;
use crate::types::{BenchError, BenchResult};

/// Echo Benchmark Harness
///
/// Load-tests an echo RPC server and sweeps one tuning dimension at a time,
/// exporting one CSV series per sweep and traffic shape.
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Echo Benchmark Harness - sweep-based load testing for echo RPC servers",
    long_about = "
The echo benchmark harness drives a fleet of worker threads against an echo
RPC server and measures tail latency, call rate and throughput. Instead of a
single measurement it sweeps one dimension at a time:

- parallelism: 1 worker up to the configured maximum, in steps of 4
- request size: ~40 log-spaced payload sizes from 256 bytes upward
- chunk size: ~20 linear chunk sizes for the streaming shapes

Each sweep runs once per enabled traffic shape (plain body, attachment,
client streaming, server streaming) and writes one CSV file per run into the
output directory. Ctrl-C stops at the next step boundary and still exports
the rows collected so far.
"
)]
pub struct Cli {
    /// Run the parallelism sweep
    #[arg(long)]
    pub for_parallelism: bool,

    /// Run the request-size sweep
    #[arg(long)]
    pub for_req_size: bool,

    /// Run the streaming chunk-size sweep
    #[arg(long)]
    pub for_chunk_size: bool,

    /// Include the plain request/response shape in sweeps
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub test_proto: bool,

    /// Include the attachment shape in sweeps
    ///
    /// Payload bytes ride as a raw attachment after the serialized header
    /// instead of inside it, skipping per-byte serialization.
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub test_attachment: bool,

    /// Include the client-streaming shape in sweeps
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub test_cstreaming: bool,

    /// Include the server-streaming shape in sweeps
    #[arg(long, default_value_t = false, action = ArgAction::Set, value_name = "BOOL")]
    pub test_sstreaming: bool,

    /// Echo server address
    #[arg(long, default_value = "127.0.0.1:8002", value_name = "ADDR")]
    pub server: SocketAddr,

    /// Wire protocol: "framed" or "json"
    ///
    /// Streaming shapes require the framed protocol; requesting them over
    /// json is rejected before any connection is opened.
    #[arg(long, default_value = "framed", value_name = "NAME")]
    pub protocol: String,

    /// Load-balancer policy across parallel channels: "rr" or "random"
    #[arg(long, default_value = "rr", value_name = "POLICY")]
    pub load_balancer: String,

    /// Per-call timeout in milliseconds
    #[arg(long, default_value = "500", value_name = "MS")]
    pub timeout_ms: u64,

    /// Retries per call after a timeout
    #[arg(long, default_value = "3", value_name = "COUNT")]
    pub max_retry: u32,

    /// Number of parallel sub-connections; 0 uses one shared connection
    #[arg(long, default_value = "0", value_name = "COUNT")]
    pub parallel_channels: usize,

    /// Maximum concurrent workers; 0 uses one worker per CPU
    ///
    /// The parallelism sweep climbs from 1 to this value. Other sweeps run
    /// with exactly this many workers.
    #[arg(long, default_value = "50", value_name = "COUNT")]
    pub parallelism: usize,

    /// Request payload size in bytes; also the request-size sweep ceiling
    ///
    /// For streaming shapes this is the total number of bytes transferred
    /// per call.
    #[arg(long, default_value = "4096", value_name = "BYTES")]
    pub req_size: usize,

    /// Streaming chunk size in bytes; also the chunk-size sweep ceiling
    #[arg(long, default_value = "16384", value_name = "BYTES")]
    pub chunk_size: usize,

    /// Chunks pushed per acknowledged batch when client-streaming
    #[arg(long, default_value = "8", value_name = "COUNT")]
    pub stream_batch: usize,

    /// Unacknowledged-byte ceiling that forces an early ack mid-batch
    #[arg(long, default_value = "1048576", value_name = "BYTES")]
    pub stream_buf_bytes: usize,

    /// Duration of each load run in milliseconds
    ///
    /// Every sweep step runs for this long. Longer runs smooth out
    /// scheduling noise at the cost of total sweep time.
    #[arg(long, default_value = "5000", value_name = "MS")]
    pub duration_ms: u64,

    /// Directory result CSV files are written into
    #[arg(long, default_value = "result", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Free-form label prefixed to result file names
    #[arg(long, default_value = "", value_name = "TEXT")]
    pub label: String,
}

impl Cli {
    /// Resolves the flags into a validated base configuration.
    ///
    /// The base carries the plain shape; sweep drivers overwrite the shape
    /// per enabled traffic shape before running.
    pub fn build_config(&self) -> BenchResult<BenchConfig> {
        let protocol: Protocol = self
            .protocol
            .parse()
            .map_err(|err: RpcError| BenchError::Configuration(err.to_string()))?;
        let lb_policy: LbPolicy = self
            .load_balancer
            .parse()
            .map_err(|err: RpcError| BenchError::Configuration(err.to_string()))?;
        let parallelism = if self.parallelism == 0 {
            num_cpus::get()
        } else {
            self.parallelism
        };

        let cfg = BenchConfig {
            server: self.server,
            shape: TrafficShape::Proto,
            protocol,
            lb_policy,
            timeout_ms: self.timeout_ms,
            max_retry: self.max_retry,
            parallel_channels: self.parallel_channels,
            parallelism,
            req_size: self.req_size,
            chunk_size: self.chunk_size,
            stream_batch: self.stream_batch,
            stream_buf_bytes: self.stream_buf_bytes,
            duration: Duration::from_millis(self.duration_ms),
            output_dir: self.output_dir.clone(),
            label: self.label.clone(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Sweep dimensions enabled on the command line, in run order.
    pub fn dimensions(&self) -> Vec<SweepDimension> {
        let mut dimensions = Vec::new();
        if self.for_parallelism {
            dimensions.push(SweepDimension::Parallelism);
        }
        if self.for_req_size {
            dimensions.push(SweepDimension::ReqSize);
        }
        if self.for_chunk_size {
            dimensions.push(SweepDimension::ChunkSize);
        }
        dimensions
    }

    /// Traffic shapes to run for one sweep dimension.
    ///
    /// Unary shapes are pointless in a chunk-size sweep and client
    /// streaming has no per-call parallelism story, so each dimension runs
    /// its own subset of the enabled shapes.
    pub fn shapes_for(&self, dimension: SweepDimension) -> Vec<TrafficShape> {
        let mut shapes = Vec::new();
        match dimension {
            SweepDimension::Parallelism => {
                if self.test_attachment {
                    shapes.push(TrafficShape::Attachment);
                }
                if self.test_proto {
                    shapes.push(TrafficShape::Proto);
                }
                if self.test_sstreaming {
                    shapes.push(TrafficShape::ServerStreaming);
                }
            }
            SweepDimension::ReqSize => {
                if self.test_attachment {
                    shapes.push(TrafficShape::Attachment);
                }
                if self.test_proto {
                    shapes.push(TrafficShape::Proto);
                }
                if self.test_cstreaming {
                    shapes.push(TrafficShape::ClientStreaming);
                }
                if self.test_sstreaming {
                    shapes.push(TrafficShape::ServerStreaming);
                }
            }
            SweepDimension::ChunkSize => {
                if self.test_cstreaming {
                    shapes.push(TrafficShape::ClientStreaming);
                }
                if self.test_sstreaming {
                    shapes.push(TrafficShape::ServerStreaming);
                }
            }
        }
        shapes
    }
}
