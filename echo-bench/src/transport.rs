//! Connection ownership for a load run.

use std::sync::Arc;

use echo_client::{Channel, EchoStub, ParallelChannel};
use log::info;

use crate::config::BenchConfig;
use crate::recorder::LatencyRecorder;
use crate::types::BenchResult;

enum Target {
    Single(Arc<Channel>),
    Fanout(Arc<ParallelChannel>),
}

/// The connections behind one load run, either a single shared channel or a
/// fan-out group of lanes.
///
/// The group owns its connections exclusively; workers only see cloned
/// [`EchoStub`] handles. Dropping the group tears every connection down.
pub struct TransportGroup {
    target: Target,
    lane_recorders: Arc<Vec<Arc<LatencyRecorder>>>,
}

impl TransportGroup {
    /// Validates the configuration and connects all lanes.
    ///
    /// Connecting is all-or-nothing: if any lane fails, the whole group
    /// fails and already-opened lanes are dropped.
    pub fn connect(cfg: &BenchConfig) -> BenchResult<Self> {
        cfg.validate()?;
        let options = cfg.channel_options();
        if cfg.fan_out() {
            let group = ParallelChannel::connect(
                cfg.server,
                cfg.parallel_channels,
                cfg.lb_policy,
                &options,
            )?;
            let recorders = (0..cfg.parallel_channels)
                .map(|_| Arc::new(LatencyRecorder::new()))
                .collect();
            Ok(Self {
                target: Target::Fanout(Arc::new(group)),
                lane_recorders: Arc::new(recorders),
            })
        } else {
            let channel = Channel::connect(cfg.server, options)?;
            Ok(Self {
                target: Target::Single(Arc::new(channel)),
                lane_recorders: Arc::new(Vec::new()),
            })
        }
    }

    /// Stub handle workers issue calls through.
    pub fn stub(&self) -> EchoStub {
        match &self.target {
            Target::Single(channel) => EchoStub::from_channel(Arc::clone(channel)),
            Target::Fanout(group) => EchoStub::from_parallel(Arc::clone(group)),
        }
    }

    /// Number of underlying connections.
    pub fn lane_count(&self) -> usize {
        match &self.target {
            Target::Single(_) => 1,
            Target::Fanout(group) => group.lane_count(),
        }
    }

    /// Per-lane recorders; empty for a single shared channel.
    pub fn lane_recorders(&self) -> Arc<Vec<Arc<LatencyRecorder>>> {
        Arc::clone(&self.lane_recorders)
    }

    /// Logs per-lane tail latency after a fan-out run.
    pub fn log_lane_latencies(&self) {
        for (lane, recorder) in self.lane_recorders.iter().enumerate() {
            info!(
                "lane {lane}: p99 {:.2}ms over {} calls",
                recorder.percentile(0.99) as f64 / 1e3,
                recorder.count()
            );
        }
    }
}
