//! Fan-out of N independent channels behind one dispatch facade.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use rand::Rng;

use echo_wire::{CallHeader, Frame};

use crate::channel::Channel;
use crate::error::{Result, RpcError};
use crate::options::{ChannelOptions, LbPolicy};

/// N independently-established connections to the same peer; every call is
/// dispatched to one lane per the load-balancing policy.
pub struct ParallelChannel {
    lanes: Vec<Channel>,
    policy: LbPolicy,
    cursor: AtomicUsize,
}

impl ParallelChannel {
    /// Connects every lane up front. One failed lane fails the whole
    /// construction; a partially-up fan-out is never handed out.
    pub fn connect(
        addr: SocketAddr,
        lanes: usize,
        policy: LbPolicy,
        options: &ChannelOptions,
    ) -> Result<Self> {
        if lanes == 0 {
            return Err(RpcError::config(
                "parallel channel needs at least one lane",
            ));
        }
        let mut connected = Vec::with_capacity(lanes);
        for lane in 0..lanes {
            let channel = Channel::connect(addr, options.clone())
                .map_err(|e| RpcError::connect(format!("lane {lane} of {lanes} failed"), e))?;
            connected.push(channel);
        }
        debug!("parallel channel up: {lanes} lanes to {addr} ({policy})");
        Ok(Self {
            lanes: connected,
            policy,
            cursor: AtomicUsize::new(0),
        })
    }

    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    fn pick(&self) -> usize {
        match self.policy {
            LbPolicy::RoundRobin => self.cursor.fetch_add(1, Ordering::Relaxed) % self.lanes.len(),
            LbPolicy::Random => rand::rng().random_range(0..self.lanes.len()),
        }
    }

    /// Issues a unary call on one lane; returns the reply and which lane
    /// served it.
    pub fn call(&self, header: &CallHeader, attachment: &[u8]) -> Result<(Frame, usize)> {
        let lane = self.pick();
        self.lanes[lane].call(header, attachment).map(|f| (f, lane))
    }
}
