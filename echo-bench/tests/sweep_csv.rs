//! Sweep-to-CSV paths against the loopback echo server.

use std::net::SocketAddr;
use std::time::Duration;

use echo_bench::{sweep_parallelism, BenchConfig, QuitToken, TrafficShape};
use echo_client::{LbPolicy, Protocol};
use echo_loopd::TestServer;

fn sweep_cfg(server: SocketAddr, output_dir: std::path::PathBuf) -> BenchConfig {
    BenchConfig {
        server,
        shape: TrafficShape::Proto,
        protocol: Protocol::Framed,
        lb_policy: LbPolicy::RoundRobin,
        timeout_ms: 2000,
        max_retry: 0,
        parallel_channels: 0,
        parallelism: 5,
        req_size: 512,
        chunk_size: 1024,
        stream_batch: 4,
        stream_buf_bytes: 1 << 20,
        duration: Duration::from_millis(100),
        output_dir,
        label: String::new(),
    }
}

#[test]
fn parallelism_sweep_exports_one_row_per_step() {
    let server = TestServer::spawn().expect("spawn server");
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = sweep_cfg(server.addr(), dir.path().to_path_buf());

    let quit = QuitToken::new();
    let path = sweep_parallelism(&cfg, &quit).expect("sweep");

    assert!(path.exists());
    let name = path.file_name().and_then(|n| n.to_str()).expect("name");
    assert!(name.starts_with("echo_parallel_proto_"), "name was {name}");

    let contents = std::fs::read_to_string(&path).expect("read csv");
    let lines: Vec<&str> = contents.lines().collect();
    // Header plus one row each for parallelism 1 and 5.
    assert_eq!(lines.len(), 3, "contents were:\n{contents}");
    assert!(lines[0].starts_with("x_axis,"));
    assert!(lines[1].starts_with("1,"));
    assert!(lines[2].starts_with("5,"));
    assert!(contents.ends_with('\n'));
}

#[test]
fn preset_quit_still_exports_a_valid_file() {
    let server = TestServer::spawn().expect("spawn server");
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = sweep_cfg(server.addr(), dir.path().to_path_buf());

    let quit = QuitToken::new();
    quit.set();
    let path = sweep_parallelism(&cfg, &quit).expect("sweep");

    let contents = std::fs::read_to_string(&path).expect("read csv");
    assert_eq!(contents, "x_axis,latency(ms),speed(MB/s),qps\n");
}
