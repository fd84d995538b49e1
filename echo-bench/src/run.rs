//! One fixed-duration load run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::error;

use crate::config::BenchConfig;
use crate::recorder::LatencyRecorder;
use crate::transport::TransportGroup;
use crate::types::BenchResult;
use crate::worker::Worker;

/// Runs `parallelism` workers against one transport group for a fixed
/// duration, then joins every worker thread before results are read.
pub struct LoadRun {
    cfg: BenchConfig,
    group: TransportGroup,
    recorder: Arc<LatencyRecorder>,
    workers: Vec<Arc<Worker>>,
    handles: Vec<thread::JoinHandle<()>>,
    active: Arc<AtomicUsize>,
}

impl LoadRun {
    /// Connects the transport group and prepares the workers. No traffic
    /// flows until [`start`](Self::start).
    pub fn new(cfg: BenchConfig) -> BenchResult<Self> {
        let group = TransportGroup::connect(&cfg)?;
        let recorder = Arc::new(LatencyRecorder::new());
        let workers = (0..cfg.parallelism)
            .map(|_| {
                Arc::new(Worker::new(
                    group.stub(),
                    Arc::clone(&recorder),
                    group.lane_recorders(),
                ))
            })
            .collect();
        Ok(Self {
            cfg,
            group,
            recorder,
            workers,
            handles: Vec::new(),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Spawns one thread per worker. Each worker decrements the active
    /// count exactly once when its loop ends.
    pub fn start(&mut self) {
        let deadline = Instant::now() + self.cfg.duration;
        for worker in &self.workers {
            let worker = Arc::clone(worker);
            let cfg = self.cfg.clone();
            let active = Arc::clone(&self.active);
            active.fetch_add(1, Ordering::SeqCst);
            self.handles.push(thread::spawn(move || {
                worker.run(&cfg, deadline, move || {
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }));
        }
    }

    /// Blocks until every worker thread has exited.
    pub fn join(&mut self) {
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
        self.group.log_lane_latencies();
    }

    /// Workers whose loops have not finished yet.
    pub fn running_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn recorder(&self) -> &Arc<LatencyRecorder> {
        &self.recorder
    }

    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    pub fn duration(&self) -> Duration {
        self.cfg.duration
    }

    /// Successful samples per lane; empty unless fanning out.
    pub fn lane_sample_counts(&self) -> Vec<u64> {
        self.group
            .lane_recorders()
            .iter()
            .map(|recorder| recorder.count())
            .collect()
    }

    pub fn sent_bytes(&self) -> u64 {
        self.workers.iter().map(|w| w.bytes_sent()).sum()
    }

    pub fn received_bytes(&self) -> u64 {
        self.workers.iter().map(|w| w.bytes_received()).sum()
    }

    pub fn calls_ok(&self) -> u64 {
        self.workers.iter().map(|w| w.calls_ok()).sum()
    }

    pub fn calls_failed(&self) -> u64 {
        self.workers.iter().map(|w| w.calls_failed()).sum()
    }

    /// Upload throughput in bytes per second over the configured duration.
    pub fn sent_bps(&self) -> f64 {
        self.sent_bytes() as f64 / self.cfg.duration.as_secs_f64()
    }

    /// Download throughput in bytes per second over the configured duration.
    pub fn received_bps(&self) -> f64 {
        self.received_bytes() as f64 / self.cfg.duration.as_secs_f64()
    }
}
