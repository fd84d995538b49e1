//! Call facade handed to users of the client library.

use std::sync::Arc;

use echo_wire::{CallHeader, MessageKind};

use crate::channel::Channel;
use crate::error::{Result, RpcError};
use crate::parallel::ParallelChannel;
use crate::stream::{PullStream, PushStream};

/// Where a request payload rides in an echo call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Placement {
    /// Inside the serialized call header.
    Body,
    /// As a raw attachment after the header.
    Attachment,
}

/// Reply to a unary echo call, including which lane served it.
#[derive(Debug)]
pub struct EchoReply {
    pub header: CallHeader,
    pub attachment: Vec<u8>,
    /// Index of the serving sub-connection; 0 on a single channel.
    pub lane: usize,
}

impl EchoReply {
    /// Echoed payload bytes, wherever they rode.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.header.body.len() + self.attachment.len()
    }
}

#[derive(Clone)]
enum Target {
    Single(Arc<Channel>),
    Fanout(Arc<ParallelChannel>),
}

/// Cheap-clone handle for issuing calls; many stubs may share one underlying
/// channel or fan-out.
#[derive(Clone)]
pub struct EchoStub {
    target: Target,
}

impl EchoStub {
    #[must_use]
    pub fn from_channel(channel: Arc<Channel>) -> Self {
        Self {
            target: Target::Single(channel),
        }
    }

    #[must_use]
    pub fn from_parallel(parallel: Arc<ParallelChannel>) -> Self {
        Self {
            target: Target::Fanout(parallel),
        }
    }

    /// How many connections sit behind this stub.
    #[must_use]
    pub fn lane_count(&self) -> usize {
        match &self.target {
            Target::Single(_) => 1,
            Target::Fanout(parallel) => parallel.lane_count(),
        }
    }

    /// Synchronous unary echo. The server returns the payload unchanged, in
    /// the same position it was sent.
    pub fn echo(&self, payload: &[u8], placement: Placement) -> Result<EchoReply> {
        let mut header = CallHeader::new(0, MessageKind::Echo);
        let attachment: &[u8] = match placement {
            Placement::Body => {
                header.body = payload.to_vec();
                &[]
            }
            Placement::Attachment => payload,
        };

        let (frame, lane) = match &self.target {
            Target::Single(channel) => (channel.call(&header, attachment)?, 0),
            Target::Fanout(parallel) => parallel.call(&header, attachment)?,
        };

        match MessageKind::try_from(frame.header.kind) {
            Ok(MessageKind::EchoAck) => Ok(EchoReply {
                header: frame.header,
                attachment: frame.attachment,
                lane,
            }),
            Ok(other) => Err(RpcError::protocol(
                format!("expected echo ack, got {other:?}"),
                None,
            )),
            Err(()) => Err(RpcError::protocol(
                format!("unknown reply kind {}", frame.header.kind),
                None,
            )),
        }
    }

    /// Opens a server-paced stream delivering `total_size` bytes in chunks
    /// of `chunk_size`.
    pub fn pull(&self, total_size: u64, chunk_size: u32) -> Result<PullStream> {
        let channel = self.streaming_channel("pull stream")?;
        PullStream::open(channel, total_size, chunk_size)
    }

    /// Opens a client-paced push stream.
    pub fn push(&self) -> Result<PushStream> {
        let channel = self.streaming_channel("push stream")?;
        PushStream::open(channel)
    }

    fn streaming_channel(&self, what: &str) -> Result<&Arc<Channel>> {
        let channel = match &self.target {
            Target::Single(channel) => channel,
            Target::Fanout(_) => {
                return Err(RpcError::unsupported(format!(
                    "{what} cannot run over a fan-out channel"
                )))
            }
        };
        if !channel.protocol().supports_streaming() {
            return Err(RpcError::unsupported(format!(
                "{what} requires the framed protocol, not {}",
                channel.protocol()
            )));
        }
        Ok(channel)
    }
}
