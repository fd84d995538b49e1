//! Resolved benchmark configuration.
//!
//! A [`BenchConfig`] describes one load run: where the echo server lives, how
//! traffic is shaped, how many workers and connections to use and for how
//! long. Sweep controllers clone the base config and vary a single field per
//! step.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use echo_client::{ChannelOptions, LbPolicy, Protocol};

use crate::types::{BenchError, BenchResult};

/// What each call on the wire looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficShape {
    /// Unary echo with the payload carried inside the serialized header body.
    Proto,
    /// Unary echo with the payload carried as a raw attachment.
    Attachment,
    /// Client-streaming: workers push chunk batches over a long-lived stream.
    ClientStreaming,
    /// Server-streaming: each call pulls a chunked response stream.
    ServerStreaming,
}

impl TrafficShape {
    /// Short label used in log lines and result file names.
    pub const fn label(self) -> &'static str {
        match self {
            TrafficShape::Proto => "proto",
            TrafficShape::Attachment => "attachment",
            TrafficShape::ClientStreaming => "cstreaming",
            TrafficShape::ServerStreaming => "sstreaming",
        }
    }

    /// Whether the shape runs over a streaming call rather than unary echoes.
    pub const fn is_streaming(self) -> bool {
        matches!(
            self,
            TrafficShape::ClientStreaming | TrafficShape::ServerStreaming
        )
    }
}

/// Fully resolved parameters for one load run.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Echo server address.
    pub server: SocketAddr,
    /// Traffic shape to generate.
    pub shape: TrafficShape,
    /// Wire protocol spoken on every connection.
    pub protocol: Protocol,
    /// Lane-selection policy when fanning out over parallel channels.
    pub lb_policy: LbPolicy,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries per call after a timeout.
    pub max_retry: u32,
    /// Number of fan-out connections; 0 means one shared connection.
    pub parallel_channels: usize,
    /// Number of concurrent workers.
    pub parallelism: usize,
    /// Unary payload size, or total stream size, in bytes.
    pub req_size: usize,
    /// Chunk size for streaming shapes, in bytes.
    pub chunk_size: usize,
    /// Chunks pushed per acknowledged batch when client-streaming.
    pub stream_batch: usize,
    /// Unacknowledged-byte ceiling that forces an ack mid-batch.
    pub stream_buf_bytes: usize,
    /// How long each load run lasts.
    pub duration: Duration,
    /// Directory result CSV files are written into.
    pub output_dir: PathBuf,
    /// Free-form label prefixed to result file names.
    pub label: String,
}

impl BenchConfig {
    /// Rejects flag combinations that cannot produce a meaningful run.
    ///
    /// Streaming over a fan-out group or over a protocol without streaming
    /// support is a configuration error rather than a per-call failure, so
    /// it surfaces before any connection is opened.
    pub fn validate(&self) -> BenchResult<()> {
        if self.parallelism == 0 {
            return Err(BenchError::Configuration(
                "parallelism must be at least 1".into(),
            ));
        }
        if self.req_size == 0 {
            return Err(BenchError::Configuration(
                "request size must be at least 1 byte".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(BenchError::Configuration(
                "chunk size must be at least 1 byte".into(),
            ));
        }
        if self.stream_batch == 0 {
            return Err(BenchError::Configuration(
                "stream batch must be at least 1 chunk".into(),
            ));
        }
        if self.duration.is_zero() {
            return Err(BenchError::Configuration(
                "run duration must be non-zero".into(),
            ));
        }
        if self.shape.is_streaming() {
            if !self.protocol.supports_streaming() {
                return Err(BenchError::Configuration(format!(
                    "{} traffic requires a streaming protocol, but {} does not support it",
                    self.shape.label(),
                    self.protocol.name()
                )));
            }
            if self.parallel_channels > 0 {
                return Err(BenchError::Configuration(format!(
                    "{} traffic cannot run over {} parallel channels; streams need a single connection",
                    self.shape.label(),
                    self.parallel_channels
                )));
            }
        }
        Ok(())
    }

    /// Channel options derived from the call-level knobs.
    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions {
            protocol: self.protocol,
            call_timeout: Duration::from_millis(self.timeout_ms),
            max_retry: self.max_retry,
            ..ChannelOptions::default()
        }
    }

    /// Whether this run fans out over parallel channels.
    pub fn fan_out(&self) -> bool {
        self.parallel_channels > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BenchConfig {
        BenchConfig {
            server: "127.0.0.1:8002".parse().unwrap(),
            shape: TrafficShape::Proto,
            protocol: Protocol::Framed,
            lb_policy: LbPolicy::RoundRobin,
            timeout_ms: 500,
            max_retry: 3,
            parallel_channels: 0,
            parallelism: 4,
            req_size: 4096,
            chunk_size: 16384,
            stream_batch: 8,
            stream_buf_bytes: 1 << 20,
            duration: Duration::from_millis(200),
            output_dir: PathBuf::from("result"),
            label: String::new(),
        }
    }

    #[test]
    fn accepts_the_default_shape() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn rejects_zero_parallelism() {
        let mut cfg = base();
        cfg.parallelism = 0;
        assert!(matches!(
            cfg.validate(),
            Err(BenchError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_streaming_over_json() {
        let mut cfg = base();
        cfg.shape = TrafficShape::ServerStreaming;
        cfg.protocol = Protocol::Json;
        assert!(matches!(
            cfg.validate(),
            Err(BenchError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_streaming_over_fan_out() {
        let mut cfg = base();
        cfg.shape = TrafficShape::ClientStreaming;
        cfg.parallel_channels = 3;
        assert!(matches!(
            cfg.validate(),
            Err(BenchError::Configuration(_))
        ));
    }

    #[test]
    fn unary_fan_out_is_fine() {
        let mut cfg = base();
        cfg.shape = TrafficShape::Attachment;
        cfg.parallel_channels = 8;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn channel_options_carry_call_knobs() {
        let mut cfg = base();
        cfg.timeout_ms = 250;
        cfg.max_retry = 1;
        let options = cfg.channel_options();
        assert_eq!(options.call_timeout, Duration::from_millis(250));
        assert_eq!(options.max_retry, 1);
        assert_eq!(options.protocol, Protocol::Framed);
    }
}
