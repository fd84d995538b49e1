use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use echo_wire::Codec;

use crate::error::RpcError;

/// Wire protocol spoken by a channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Protocol {
    /// rkyv-framed protocol; the only one that supports streaming calls.
    Framed,
    /// JSON-header protocol, unary calls only.
    Json,
}

impl Protocol {
    /// The header codec this protocol puts on the wire.
    #[must_use]
    pub const fn codec(self) -> Codec {
        match self {
            Self::Framed => Codec::Rkyv,
            Self::Json => Codec::Json,
        }
    }

    /// Whether pull/push streams may be opened over this protocol.
    #[must_use]
    pub const fn supports_streaming(self) -> bool {
        matches!(self, Self::Framed)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Framed => "framed",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Protocol {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "framed" => Ok(Self::Framed),
            "json" => Ok(Self::Json),
            other => Err(RpcError::config(format!(
                "unknown protocol {other:?}; expected \"framed\" or \"json\""
            ))),
        }
    }
}

/// Load-balancing policy used by a parallel channel to pick a lane per call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LbPolicy {
    /// Cycle through lanes in order.
    RoundRobin,
    /// Pick a lane uniformly at random.
    Random,
}

impl LbPolicy {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RoundRobin => "rr",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for LbPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LbPolicy {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rr" | "round_robin" => Ok(Self::RoundRobin),
            "random" => Ok(Self::Random),
            other => Err(RpcError::config(format!(
                "unknown load-balancing policy {other:?}; expected \"rr\" or \"random\""
            ))),
        }
    }
}

/// Options governing connection establishment and per-call behavior.
#[derive(Clone, Debug)]
pub struct ChannelOptions {
    pub protocol: Protocol,
    /// Deadline for the TCP connect itself.
    pub connect_timeout: Duration,
    /// Deadline for each call attempt.
    pub call_timeout: Duration,
    /// How many extra attempts a timed-out call gets.
    pub max_retry: u32,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            protocol: Protocol::Framed,
            connect_timeout: Duration::from_secs(1),
            call_timeout: Duration::from_millis(500),
            max_retry: 3,
        }
    }
}
