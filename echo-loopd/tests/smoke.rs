//! Raw-wire smoke test for the loopback server.

use std::io::Write;
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use echo_loopd::TestServer;
use echo_wire::{read_frame, write_frame, CallHeader, Codec, MessageKind};

#[test]
fn echoes_a_raw_frame() {
    let server = TestServer::spawn().expect("spawn server");
    let mut stream = TcpStream::connect(server.addr()).expect("connect");

    let mut header = CallHeader::new(99, MessageKind::Echo);
    header.body = b"ping".to_vec();
    write_frame(&mut stream, Codec::Rkyv, &header, b"-attached").expect("write");

    let reply = read_frame(&mut stream).expect("read reply");
    assert_eq!(reply.header.seq, 99);
    assert_eq!(
        MessageKind::try_from(reply.header.kind),
        Ok(MessageKind::EchoAck)
    );
    assert_eq!(reply.header.body, b"ping");
    assert_eq!(reply.attachment, b"-attached");
}

#[test]
fn a_frame_split_across_the_idle_poll_still_echoes() {
    let server = TestServer::spawn().expect("spawn server");
    let mut stream = TcpStream::connect(server.addr()).expect("connect");

    let mut header = CallHeader::new(11, MessageKind::Echo);
    header.body = b"slow".to_vec();
    let mut buf = Vec::new();
    write_frame(&mut buf, Codec::Rkyv, &header, b"-half").expect("encode");

    // The pause outlasts the server's idle-poll timeout, so the second half
    // arrives after at least one poll has expired mid-frame.
    let split = buf.len() / 2;
    stream.write_all(&buf[..split]).expect("first half");
    stream.flush().expect("flush");
    thread::sleep(Duration::from_millis(700));
    stream.write_all(&buf[split..]).expect("second half");

    let reply = read_frame(&mut stream).expect("read reply");
    assert_eq!(reply.header.seq, 11);
    assert_eq!(
        MessageKind::try_from(reply.header.kind),
        Ok(MessageKind::EchoAck)
    );
    assert_eq!(reply.header.body, b"slow");
    assert_eq!(reply.attachment, b"-half");
}

#[test]
fn streams_pull_chunks_to_completion() {
    let server = TestServer::spawn().expect("spawn server");
    let mut stream = TcpStream::connect(server.addr()).expect("connect");

    let mut header = CallHeader::new(5, MessageKind::Pull);
    header.total_size = 2500;
    header.chunk_size = 1000;
    write_frame(&mut stream, Codec::Rkyv, &header, &[]).expect("write");

    let mut received = 0u64;
    loop {
        let frame = read_frame(&mut stream).expect("read stream frame");
        match MessageKind::try_from(frame.header.kind) {
            Ok(MessageKind::PullChunk) => received += frame.attachment.len() as u64,
            Ok(MessageKind::PullEnd) => {
                assert_eq!(frame.header.total_size, 2500);
                break;
            }
            other => panic!("unexpected frame kind {other:?}"),
        }
    }
    assert_eq!(received, 2500);
}
