//! One benchmark worker and its per-shape call loops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use echo_client::{EchoStub, Placement, PushStream, RpcError};
use log::{debug, warn};

use crate::config::{BenchConfig, TrafficShape};
use crate::recorder::LatencyRecorder;

/// Failures logged per worker before the log goes quiet.
const FAILURE_LOG_CAP: u64 = 5;

/// A single load-generating worker.
///
/// Workers share the run's recorder and stub but keep their own byte and
/// call counters, which the run sums after joining. A failed call is
/// counted and the loop keeps going; only a dead stream ends a worker
/// early.
pub struct Worker {
    stub: EchoStub,
    recorder: Arc<LatencyRecorder>,
    lane_recorders: Arc<Vec<Arc<LatencyRecorder>>>,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    calls_ok: AtomicU64,
    calls_failed: AtomicU64,
}

impl Worker {
    pub fn new(
        stub: EchoStub,
        recorder: Arc<LatencyRecorder>,
        lane_recorders: Arc<Vec<Arc<LatencyRecorder>>>,
    ) -> Self {
        Self {
            stub,
            recorder,
            lane_recorders,
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            calls_ok: AtomicU64::new(0),
            calls_failed: AtomicU64::new(0),
        }
    }

    /// Issues calls until `deadline`, then fires `on_done` exactly once.
    pub fn run(&self, cfg: &BenchConfig, deadline: Instant, on_done: impl FnOnce()) {
        match cfg.shape {
            TrafficShape::Proto => self.run_unary(cfg, deadline, Placement::Body),
            TrafficShape::Attachment => self.run_unary(cfg, deadline, Placement::Attachment),
            TrafficShape::ServerStreaming => self.run_pull(cfg, deadline),
            TrafficShape::ClientStreaming => self.run_push(cfg, deadline),
        }
        on_done();
    }

    fn run_unary(&self, cfg: &BenchConfig, deadline: Instant, placement: Placement) {
        let payload = vec![b'a'; cfg.req_size];
        while Instant::now() < deadline {
            let start = Instant::now();
            match self.stub.echo(&payload, placement) {
                Ok(reply) => {
                    self.sample(start, reply.lane);
                    self.bytes_sent
                        .fetch_add(payload.len() as u64, Ordering::Relaxed);
                    self.bytes_received
                        .fetch_add(reply.payload_len() as u64, Ordering::Relaxed);
                }
                Err(err) => self.note_failure(&err),
            }
        }
    }

    /// Response-paced loop: each call opens a pull stream and drains it.
    /// Nothing meaningful is uploaded, so `bytes_sent` stays zero.
    fn run_pull(&self, cfg: &BenchConfig, deadline: Instant) {
        while Instant::now() < deadline {
            let start = Instant::now();
            match self.drain_pull(cfg) {
                Ok(received) => {
                    self.sample(start, 0);
                    self.bytes_received.fetch_add(received, Ordering::Relaxed);
                }
                Err(err) => self.note_failure(&err),
            }
        }
    }

    fn drain_pull(&self, cfg: &BenchConfig) -> Result<u64, RpcError> {
        let mut stream = self
            .stub
            .pull(cfg.req_size as u64, cfg.chunk_size as u32)?;
        let mut received = 0u64;
        while let Some(chunk) = stream.next_chunk()? {
            received += chunk.len() as u64;
        }
        Ok(received)
    }

    /// Request-paced loop over one long-lived push stream. Each call pushes
    /// `req_size` bytes and counts one sample once its final ack lands.
    fn run_push(&self, cfg: &BenchConfig, deadline: Instant) {
        let mut stream = match self.stub.push() {
            Ok(stream) => stream,
            Err(err) => {
                self.note_failure(&err);
                return;
            }
        };
        let chunk = vec![b'a'; cfg.chunk_size];
        while Instant::now() < deadline {
            let start = Instant::now();
            match self.push_call(&mut stream, &chunk, cfg) {
                Ok(pushed) => {
                    self.sample(start, 0);
                    self.bytes_sent.fetch_add(pushed, Ordering::Relaxed);
                }
                Err(err) => {
                    self.note_failure(&err);
                    break;
                }
            }
        }
        if let Err(err) = stream.close() {
            debug!("push stream close failed: {err}");
        }
    }

    /// Pushes one call's worth of bytes: `req_size` total in `chunk_size`
    /// chunks, the last one partial. An ack is requested every
    /// `stream_batch` chunks, whenever the unacknowledged backlog would top
    /// `stream_buf_bytes`, and on the final chunk, so the sample covers the
    /// whole call.
    fn push_call(
        &self,
        stream: &mut PushStream,
        chunk: &[u8],
        cfg: &BenchConfig,
    ) -> Result<u64, RpcError> {
        let total = cfg.req_size as u64;
        let mut pushed = 0u64;
        let mut in_batch = 0usize;
        while pushed < total {
            let n = (chunk.len() as u64).min(total - pushed) as usize;
            let last = pushed + n as u64 == total;
            in_batch += 1;
            let want_ack = last
                || in_batch == cfg.stream_batch
                || stream.unacked_bytes() + n as u64 >= cfg.stream_buf_bytes as u64;
            stream.send_chunk(&chunk[..n], want_ack)?;
            if want_ack {
                in_batch = 0;
            }
            pushed += n as u64;
        }
        Ok(pushed)
    }

    fn sample(&self, start: Instant, lane: usize) {
        let micros = start.elapsed().as_micros() as u64;
        self.recorder.record(micros);
        if let Some(lane_recorder) = self.lane_recorders.get(lane) {
            lane_recorder.record(micros);
        }
        self.calls_ok.fetch_add(1, Ordering::Relaxed);
    }

    fn note_failure(&self, err: &RpcError) {
        self.recorder.record_failure();
        let seen = self.calls_failed.fetch_add(1, Ordering::Relaxed);
        if seen < FAILURE_LOG_CAP {
            warn!("call failed: {err}");
        } else if seen == FAILURE_LOG_CAP {
            warn!("further call failures on this worker suppressed");
        }
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn calls_ok(&self) -> u64 {
        self.calls_ok.load(Ordering::Relaxed)
    }

    pub fn calls_failed(&self) -> u64 {
        self.calls_failed.load(Ordering::Relaxed)
    }
}
