//! Loopback echo server used by the integration tests.
//!
//! Binds an ephemeral port on localhost and answers every message kind of
//! the echo protocol, in whichever codec each frame arrives. One thread per
//! connection, blocking I/O throughout. This crate is test tooling only; the
//! benchmark itself talks to whatever real server the target address names.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{debug, warn};

use echo_wire::{read_frame, write_frame, CallHeader, Frame, MessageKind, WireError};

/// How long a connection handler waits for the next frame to begin before
/// re-checking the stop flag.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A running loopback server; shuts down when dropped.
pub struct TestServer {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Binds `127.0.0.1:0` and starts accepting.
    pub fn spawn() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").context("bind loopback listener")?;
        let addr = listener.local_addr().context("query listener address")?;
        let stop = Arc::new(AtomicBool::new(false));

        let acceptor = thread::spawn({
            let stop = Arc::clone(&stop);
            move || accept_loop(&listener, &stop)
        });

        Ok(Self {
            addr,
            stop,
            acceptor: Some(acceptor),
        })
    }

    /// Address clients should connect to.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // A throwaway connection unblocks the acceptor.
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.acceptor.take() {
            let _ = handle.join();
        }
    }
}

fn accept_loop(listener: &TcpListener, stop: &Arc<AtomicBool>) {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                let stop = Arc::clone(stop);
                thread::spawn(move || {
                    if let Err(e) = serve_connection(stream, &stop) {
                        debug!("connection from {peer} ended: {e:#}");
                    }
                });
            }
            Err(e) => {
                warn!("accept failed: {e}");
                break;
            }
        }
    }
}

fn serve_connection(stream: TcpStream, stop: &AtomicBool) -> Result<()> {
    let mut reader = stream.try_clone().context("clone connection stream")?;
    let mut writer = stream;

    // Bytes received per open push stream, keyed by sequence number.
    let mut push_totals: HashMap<u64, u64> = HashMap::new();

    loop {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        // Idle waiting happens on a peek so a frame arriving right at the
        // timeout is never half-consumed.
        reader
            .set_read_timeout(Some(READ_POLL_INTERVAL))
            .context("set read timeout")?;
        let mut peeked = [0u8; 1];
        match reader.peek(&mut peeked) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue;
            }
            Err(e) => return Err(e).context("poll connection"),
        }
        reader
            .set_read_timeout(None)
            .context("clear read timeout")?;
        let frame = match read_frame(&mut reader) {
            Ok(frame) => frame,
            Err(WireError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).context("read frame"),
        };
        handle_frame(&mut writer, frame, &mut push_totals)?;
    }
    Ok(())
}

fn handle_frame(
    writer: &mut TcpStream,
    frame: Frame,
    push_totals: &mut HashMap<u64, u64>,
) -> Result<()> {
    let codec = frame.codec;
    let seq = frame.header.seq;
    let Ok(kind) = MessageKind::try_from(frame.header.kind) else {
        bail!("unknown frame kind {}", frame.header.kind);
    };

    match kind {
        MessageKind::Echo => {
            let mut reply = CallHeader::new(seq, MessageKind::EchoAck);
            reply.body = frame.header.body;
            write_frame(writer, codec, &reply, &frame.attachment).context("write echo ack")?;
        }
        MessageKind::Pull => {
            let total = frame.header.total_size;
            let chunk_size = u64::from(frame.header.chunk_size.max(1));
            let chunk = vec![b'a'; chunk_size as usize];
            let mut sent = 0u64;
            while sent < total {
                let n = chunk_size.min(total - sent) as usize;
                let header = CallHeader::new(seq, MessageKind::PullChunk);
                write_frame(writer, codec, &header, &chunk[..n]).context("write pull chunk")?;
                sent += n as u64;
            }
            let mut end = CallHeader::new(seq, MessageKind::PullEnd);
            end.total_size = sent;
            write_frame(writer, codec, &end, &[]).context("write pull end")?;
        }
        MessageKind::PushOpen => {
            push_totals.insert(seq, 0);
            let ack = CallHeader::new(seq, MessageKind::PushOpenAck);
            write_frame(writer, codec, &ack, &[]).context("write push-open ack")?;
        }
        MessageKind::PushChunk => {
            let received = push_totals.entry(seq).or_insert(0);
            *received += frame.payload_len() as u64;
            if frame.header.want_ack {
                let mut ack = CallHeader::new(seq, MessageKind::PushAck);
                ack.total_size = *received;
                write_frame(writer, codec, &ack, &[]).context("write push ack")?;
            }
        }
        MessageKind::PushClose => {
            push_totals.remove(&seq);
        }
        _ => {
            bail!("unexpected frame kind {kind:?} from a client");
        }
    }
    Ok(())
}
