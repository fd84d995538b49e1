//! Streamed calls over a multiplexed channel.
//!
//! A stream keeps its sequence number registered with the channel for its
//! whole lifetime, so every frame the server sends under that number lands
//! in the stream's receiver rather than in a unary caller's.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use echo_wire::{CallHeader, Frame, MessageKind};

use crate::channel::Channel;
use crate::error::{Result, RpcError};

fn recv_frame(rx: &Receiver<Frame>, timeout: Duration) -> Result<Frame> {
    match rx.recv_timeout(timeout) {
        Ok(frame) => Ok(frame),
        Err(RecvTimeoutError::Timeout) => Err(RpcError::timeout(timeout.as_millis() as u64)),
        Err(RecvTimeoutError::Disconnected) => {
            Err(RpcError::broken("channel reader exited mid-stream"))
        }
    }
}

fn frame_kind(frame: &Frame) -> Result<MessageKind> {
    MessageKind::try_from(frame.header.kind)
        .map_err(|()| RpcError::protocol(format!("unknown frame kind {}", frame.header.kind), None))
}

/// Server-paced stream: one request, then chunks until end-of-stream.
#[derive(Debug)]
pub struct PullStream {
    channel: Arc<Channel>,
    seq: u64,
    rx: Receiver<Frame>,
    finished: bool,
}

impl PullStream {
    pub(crate) fn open(channel: &Arc<Channel>, total_size: u64, chunk_size: u32) -> Result<Self> {
        let seq = channel.next_seq();
        let rx = channel.register(seq)?;
        let stream = Self {
            channel: Arc::clone(channel),
            seq,
            rx,
            finished: false,
        };

        let mut header = CallHeader::new(seq, MessageKind::Pull);
        header.total_size = total_size;
        header.chunk_size = chunk_size;
        stream.channel.send(&header, &[])?;
        Ok(stream)
    }

    /// Next chunk's bytes, or `None` once the server signals end of stream.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }
        let frame = recv_frame(&self.rx, self.channel.call_timeout())?;
        match frame_kind(&frame)? {
            MessageKind::PullChunk => Ok(Some(frame.attachment)),
            MessageKind::PullEnd => {
                self.finished = true;
                Ok(None)
            }
            other => Err(RpcError::protocol(
                format!("unexpected {other:?} frame in pull stream"),
                Some(self.channel.peer()),
            )),
        }
    }
}

impl Drop for PullStream {
    fn drop(&mut self) {
        self.channel.unregister(self.seq);
    }
}

/// Client-paced stream: the caller pushes chunks and periodically asks the
/// server to acknowledge everything received so far.
#[derive(Debug)]
pub struct PushStream {
    channel: Arc<Channel>,
    seq: u64,
    rx: Receiver<Frame>,
    unacked: u64,
}

impl PushStream {
    pub(crate) fn open(channel: &Arc<Channel>) -> Result<Self> {
        let seq = channel.next_seq();
        let rx = channel.register(seq)?;
        let mut stream = Self {
            channel: Arc::clone(channel),
            seq,
            rx,
            unacked: 0,
        };
        stream.handshake()?;
        Ok(stream)
    }

    fn handshake(&mut self) -> Result<()> {
        let header = CallHeader::new(self.seq, MessageKind::PushOpen);
        self.channel.send(&header, &[])?;
        let frame = recv_frame(&self.rx, self.channel.call_timeout())?;
        match frame_kind(&frame)? {
            MessageKind::PushOpenAck => Ok(()),
            other => Err(RpcError::protocol(
                format!("expected push-open ack, got {other:?}"),
                Some(self.channel.peer()),
            )),
        }
    }

    /// Sends one chunk. With `want_ack` set, blocks for the server's
    /// acknowledgement and returns the cumulative byte count it reported.
    pub fn send_chunk(&mut self, chunk: &[u8], want_ack: bool) -> Result<Option<u64>> {
        let mut header = CallHeader::new(self.seq, MessageKind::PushChunk);
        header.want_ack = want_ack;
        self.channel.send(&header, chunk)?;
        self.unacked += chunk.len() as u64;
        if !want_ack {
            return Ok(None);
        }

        let frame = recv_frame(&self.rx, self.channel.call_timeout())?;
        match frame_kind(&frame)? {
            MessageKind::PushAck => {
                self.unacked = 0;
                Ok(Some(frame.header.total_size))
            }
            other => Err(RpcError::protocol(
                format!("expected push ack, got {other:?}"),
                Some(self.channel.peer()),
            )),
        }
    }

    /// Bytes pushed since the last acknowledgement.
    #[must_use]
    pub fn unacked_bytes(&self) -> u64 {
        self.unacked
    }

    /// Tells the server the stream is done. Registration cleanup happens on
    /// drop either way.
    pub fn close(self) -> Result<()> {
        let header = CallHeader::new(self.seq, MessageKind::PushClose);
        self.channel.send(&header, &[])
    }
}

impl Drop for PushStream {
    fn drop(&mut self) {
        self.channel.unregister(self.seq);
    }
}
