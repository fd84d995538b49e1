//! End-to-end client tests against the loopback echo server.

use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use echo_client::{
    Channel, ChannelOptions, EchoStub, LbPolicy, ParallelChannel, Placement, Protocol, RpcError,
};
use echo_loopd::TestServer;

fn framed_options() -> ChannelOptions {
    ChannelOptions {
        protocol: Protocol::Framed,
        ..ChannelOptions::default()
    }
}

fn single_stub(server: &TestServer, options: ChannelOptions) -> EchoStub {
    let channel = Channel::connect(server.addr(), options).expect("connect");
    EchoStub::from_channel(Arc::new(channel))
}

#[test]
fn unary_echo_roundtrip_framed() {
    let server = TestServer::spawn().expect("spawn server");
    let stub = single_stub(&server, framed_options());

    let reply = stub.echo(b"hello body", Placement::Body).expect("echo");
    assert_eq!(reply.header.body, b"hello body");
    assert!(reply.attachment.is_empty());
    assert_eq!(reply.lane, 0);

    let reply = stub
        .echo(b"hello attachment", Placement::Attachment)
        .expect("echo");
    assert_eq!(reply.attachment, b"hello attachment");
    assert!(reply.header.body.is_empty());
    assert_eq!(reply.payload_len(), "hello attachment".len());
}

#[test]
fn unary_echo_roundtrip_json() {
    let server = TestServer::spawn().expect("spawn server");
    let options = ChannelOptions {
        protocol: Protocol::Json,
        ..ChannelOptions::default()
    };
    let stub = single_stub(&server, options);

    let reply = stub.echo(b"json payload", Placement::Body).expect("echo");
    assert_eq!(reply.header.body, b"json payload");
}

#[test]
fn concurrent_calls_share_one_channel() {
    let server = TestServer::spawn().expect("spawn server");
    let stub = single_stub(&server, framed_options());

    let mut handles = Vec::new();
    for thread_id in 0..8u8 {
        let stub = stub.clone();
        handles.push(thread::spawn(move || {
            for call_id in 0..25u8 {
                let payload = vec![thread_id ^ call_id; 64];
                let reply = stub.echo(&payload, Placement::Body).expect("echo");
                // A cross-wired reply would carry another call's bytes.
                assert_eq!(reply.header.body, payload);
            }
        }));
    }
    for handle in handles {
        handle.join().expect("worker thread");
    }
}

#[test]
fn silent_server_times_the_call_out() {
    // Bound but never accepted; the connect succeeds via the backlog and
    // no reply ever arrives.
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let options = ChannelOptions {
        call_timeout: Duration::from_millis(100),
        max_retry: 0,
        ..ChannelOptions::default()
    };
    let channel = Channel::connect(addr, options).expect("connect");
    let stub = EchoStub::from_channel(Arc::new(channel));

    let err = stub.echo(b"anyone there", Placement::Body).unwrap_err();
    assert!(matches!(err, RpcError::Timeout { .. }), "got {err:?}");
}

#[test]
fn round_robin_spreads_calls_evenly() {
    let server = TestServer::spawn().expect("spawn server");
    let parallel = ParallelChannel::connect(
        server.addr(),
        3,
        LbPolicy::RoundRobin,
        &framed_options(),
    )
    .expect("connect lanes");
    let stub = EchoStub::from_parallel(Arc::new(parallel));

    let mut per_lane = [0u32; 3];
    for _ in 0..30 {
        let reply = stub.echo(b"spread me", Placement::Body).expect("echo");
        per_lane[reply.lane] += 1;
    }
    assert_eq!(per_lane, [10, 10, 10]);
}

#[test]
fn random_policy_reaches_every_lane() {
    let server = TestServer::spawn().expect("spawn server");
    let parallel =
        ParallelChannel::connect(server.addr(), 3, LbPolicy::Random, &framed_options())
            .expect("connect lanes");
    let stub = EchoStub::from_parallel(Arc::new(parallel));

    let mut per_lane = [0u32; 3];
    for _ in 0..30 {
        let reply = stub.echo(b"roll the dice", Placement::Body).expect("echo");
        per_lane[reply.lane] += 1;
    }
    assert!(per_lane.iter().all(|&count| count > 0), "{per_lane:?}");
}

#[test]
fn pull_stream_delivers_the_requested_bytes() {
    let server = TestServer::spawn().expect("spawn server");
    let stub = single_stub(&server, framed_options());

    let mut stream = stub.pull(10_000, 1024).expect("open pull");
    let mut chunks = 0;
    let mut received = 0u64;
    while let Some(chunk) = stream.next_chunk().expect("next chunk") {
        chunks += 1;
        received += chunk.len() as u64;
    }
    assert_eq!(chunks, 10);
    assert_eq!(received, 10_000);
    // Once finished the stream stays finished.
    assert!(stream.next_chunk().expect("after end").is_none());
}

#[test]
fn push_stream_acks_cumulative_bytes() {
    let server = TestServer::spawn().expect("spawn server");
    let stub = single_stub(&server, framed_options());

    let mut stream = stub.push().expect("open push");
    let chunk = vec![b'x'; 512];

    assert!(stream.send_chunk(&chunk, false).expect("send").is_none());
    assert!(stream.send_chunk(&chunk, false).expect("send").is_none());
    assert_eq!(stream.unacked_bytes(), 1024);
    let acked = stream.send_chunk(&chunk, true).expect("send with ack");
    assert_eq!(acked, Some(1536));
    assert_eq!(stream.unacked_bytes(), 0);

    let acked = stream.send_chunk(&chunk, true).expect("second batch");
    assert_eq!(acked, Some(2048));

    stream.close().expect("close");
}

#[test]
fn streaming_needs_the_framed_protocol() {
    let server = TestServer::spawn().expect("spawn server");
    let options = ChannelOptions {
        protocol: Protocol::Json,
        ..ChannelOptions::default()
    };
    let stub = single_stub(&server, options);

    let err = stub.pull(4096, 256).unwrap_err();
    assert!(matches!(err, RpcError::Unsupported { .. }), "got {err:?}");
}

#[test]
fn streaming_refuses_a_fan_out_target() {
    let server = TestServer::spawn().expect("spawn server");
    let parallel = ParallelChannel::connect(
        server.addr(),
        2,
        LbPolicy::RoundRobin,
        &framed_options(),
    )
    .expect("connect lanes");
    let stub = EchoStub::from_parallel(Arc::new(parallel));

    let err = stub.push().unwrap_err();
    assert!(matches!(err, RpcError::Unsupported { .. }), "got {err:?}");
}
