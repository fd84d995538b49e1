//! A multiplexed connection to the echo server.
//!
//! One `Channel` owns one TCP stream. Any number of threads may issue calls
//! concurrently: each call is tagged with a fresh sequence number, whole
//! frames are written under a writer lock, and a dedicated reader thread
//! demultiplexes reply frames back to the issuing caller through a per-call
//! channel. Stream calls register their sequence number for the lifetime of
//! the stream and receive every frame carrying it.

use std::collections::HashMap;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;
use socket2::{SockRef, TcpKeepalive};

use echo_wire::{read_frame, write_frame, CallHeader, Frame};

use crate::error::{Result, RpcError};
use crate::options::{ChannelOptions, Protocol};

/// One multiplexed connection; cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct Channel {
    shared: Arc<Shared>,
    reader: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct Shared {
    writer: Mutex<TcpStream>,
    pending: Mutex<HashMap<u64, Sender<Frame>>>,
    next_seq: AtomicU64,
    broken: AtomicBool,
    options: ChannelOptions,
    peer: SocketAddr,
}

impl Channel {
    /// Establishes the connection and starts the reply reader.
    pub fn connect(addr: SocketAddr, options: ChannelOptions) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, options.connect_timeout)
            .map_err(|e| RpcError::connect(format!("connect to {addr} failed"), e))?;
        stream.set_nodelay(true)?;
        let keepalive = TcpKeepalive::new().with_time(Duration::from_secs(30));
        SockRef::from(&stream).set_tcp_keepalive(&keepalive)?;

        let read_half = stream.try_clone()?;
        let shared = Arc::new(Shared {
            writer: Mutex::new(stream),
            pending: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            broken: AtomicBool::new(false),
            options,
            peer: addr,
        });

        let reader = thread::spawn({
            let shared = Arc::clone(&shared);
            move || reader_loop(read_half, &shared)
        });

        Ok(Self {
            shared,
            reader: Some(reader),
        })
    }

    /// Issues one unary call, retrying timed-out attempts up to the
    /// configured retry budget. Each attempt gets a fresh sequence number so
    /// a late reply to an abandoned attempt can never satisfy a retry.
    pub fn call(&self, header: &CallHeader, attachment: &[u8]) -> Result<Frame> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.issue(header.clone(), attachment) {
                Ok(frame) => return Ok(frame),
                Err(e) if e.is_retryable() && attempt <= self.shared.options.max_retry => {
                    debug!(
                        "call attempt {attempt} to {} failed: {e}; retrying",
                        self.shared.peer
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn issue(&self, mut header: CallHeader, attachment: &[u8]) -> Result<Frame> {
        if self.is_broken() {
            return Err(RpcError::broken(format!(
                "connection to {} is down",
                self.shared.peer
            )));
        }

        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        header.seq = seq;
        let rx = self.register(seq)?;

        let timeout = self.shared.options.call_timeout;
        let result = self
            .send(&header, attachment)
            .and_then(|()| match rx.recv_timeout(timeout) {
                Ok(frame) => Ok(frame),
                Err(RecvTimeoutError::Timeout) => Err(RpcError::timeout(timeout.as_millis() as u64)),
                Err(RecvTimeoutError::Disconnected) => Err(RpcError::broken(format!(
                    "reader for {} exited mid-call",
                    self.shared.peer
                ))),
            });
        self.unregister(seq);
        result
    }

    /// Registers a receiver for every frame carrying `seq`. Stream calls hold
    /// the registration open until the stream closes.
    pub(crate) fn register(&self, seq: u64) -> Result<Receiver<Frame>> {
        let (tx, rx) = mpsc::channel();
        let mut pending = self
            .shared
            .pending
            .lock()
            .map_err(|_| RpcError::broken("pending map lock poisoned"))?;
        pending.insert(seq, tx);
        Ok(rx)
    }

    pub(crate) fn unregister(&self, seq: u64) {
        if let Ok(mut pending) = self.shared.pending.lock() {
            pending.remove(&seq);
        }
    }

    /// Writes one whole frame under the writer lock.
    pub(crate) fn send(&self, header: &CallHeader, attachment: &[u8]) -> Result<()> {
        if self.is_broken() {
            return Err(RpcError::broken(format!(
                "connection to {} is down",
                self.shared.peer
            )));
        }
        let mut writer = self
            .shared
            .writer
            .lock()
            .map_err(|_| RpcError::broken("writer lock poisoned"))?;
        write_frame(
            &mut *writer,
            self.shared.options.protocol.codec(),
            header,
            attachment,
        )?;
        Ok(())
    }

    pub(crate) fn next_seq(&self) -> u64 {
        self.shared.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn call_timeout(&self) -> Duration {
        self.shared.options.call_timeout
    }

    #[must_use]
    pub fn protocol(&self) -> Protocol {
        self.shared.options.protocol
    }

    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.shared.peer
    }

    /// True once the reader thread has observed a fatal transport error.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.shared.broken.load(Ordering::SeqCst)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.shared.broken.store(true, Ordering::SeqCst);
        if let Ok(writer) = self.shared.writer.lock() {
            let _ = writer.shutdown(Shutdown::Both);
        }
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

fn reader_loop(mut stream: TcpStream, shared: &Shared) {
    loop {
        match read_frame(&mut stream) {
            Ok(frame) => {
                let seq = frame.header.seq;
                let tx = match shared.pending.lock() {
                    Ok(pending) => pending.get(&seq).cloned(),
                    Err(_) => break,
                };
                match tx {
                    // A closed receiver means the caller gave up (timeout);
                    // the late reply is dropped on the floor.
                    Some(tx) => {
                        if tx.send(frame).is_err() {
                            debug!("dropped late reply for seq {seq} from {}", shared.peer);
                        }
                    }
                    None => debug!("no waiter for seq {seq} from {}", shared.peer),
                }
            }
            Err(e) => {
                if !shared.broken.swap(true, Ordering::SeqCst) {
                    debug!("reader for {} stopped: {e}", shared.peer);
                }
                break;
            }
        }
    }
    // Dropping the senders wakes every in-flight caller with a disconnect.
    if let Ok(mut pending) = shared.pending.lock() {
        pending.clear();
    }
}
