//! Controller tests: admission control, idle deadlines, shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

use ferrite::config::Config;
use ferrite::http::response::Response;
use ferrite::server::{Call, Controller, ControllerStats, ShutdownHandle};

async fn hello(_call: Call) -> Response {
    Response::ok("hi")
}

async fn spawn_server(
    yaml: &str,
) -> (
    SocketAddr,
    ShutdownHandle,
    Arc<ControllerStats>,
    tokio::task::JoinHandle<anyhow::Result<()>>,
) {
    let mut cfg = Config::from_yaml(yaml).unwrap();
    cfg.server.listen_addr = "127.0.0.1:0".to_string();
    let controller = Controller::bind(&cfg, hello).await.unwrap();
    let addr = controller.local_addr();
    let shutdown = controller.shutdown_handle();
    let stats = controller.stats();
    let task = tokio::spawn(controller.run());
    (addr, shutdown, stats, task)
}

/// One keep-alive request; returns the raw response bytes.
async fn do_request(stream: &mut TcpStream) -> Vec<u8> {
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: h\r\n\r\n")
        .await
        .unwrap();
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed mid-response");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            // body is the two bytes of "hi"
            if buf.len() >= pos + 4 + 2 {
                break;
            }
        }
    }
    buf
}

#[tokio::test]
async fn test_overload_rejects_accepts_without_disturbing_live_connections() {
    let (addr, shutdown, stats, _task) = spawn_server(
        "server:\n  max_connections: 2\n  idle_timeout_ms: 5000\n",
    )
    .await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    let response = do_request(&mut first).await;
    assert!(response.starts_with(b"HTTP/1.1 200"));

    let mut second = TcpStream::connect(addr).await.unwrap();
    do_request(&mut second).await;
    assert_eq!(stats.live(), 2);

    // At the ceiling: the third accept is closed immediately
    let mut third = TcpStream::connect(addr).await.unwrap();
    let mut chunk = [0u8; 64];
    let n = timeout(Duration::from_secs(2), third.read(&mut chunk))
        .await
        .expect("rejected connection should close promptly")
        .unwrap();
    assert_eq!(n, 0);
    assert_eq!(stats.rejected(), 1);
    assert_eq!(stats.accepted(), 2);

    // Existing connections keep working
    let response = do_request(&mut first).await;
    assert!(response.starts_with(b"HTTP/1.1 200"));
    shutdown.shutdown();
}

#[tokio::test]
async fn test_slot_freed_by_a_closed_connection_is_reusable() {
    let (addr, shutdown, stats, _task) =
        spawn_server("server:\n  max_connections: 1\n").await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    first
        .write_all(b"GET / HTTP/1.1\r\nHost: h\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut drained = Vec::new();
    first.read_to_end(&mut drained).await.unwrap();
    assert!(drained.starts_with(b"HTTP/1.1 200"));

    // Wait for the controller to observe the close
    for _ in 0..100 {
        if stats.live() == 0 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(stats.live(), 0);

    let mut second = TcpStream::connect(addr).await.unwrap();
    let response = do_request(&mut second).await;
    assert!(response.starts_with(b"HTTP/1.1 200"));
    assert_eq!(stats.accepted(), 2);
    assert_eq!(stats.rejected(), 0);
    shutdown.shutdown();
}

#[tokio::test]
async fn test_idle_connection_closed_at_deadline() {
    let (addr, shutdown, _stats, _task) =
        spawn_server("server:\n  idle_timeout_ms: 100\n").await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    // Send nothing; the idle deadline forces closure
    let mut chunk = [0u8; 64];
    let n = timeout(Duration::from_secs(2), stream.read(&mut chunk))
        .await
        .expect("idle connection should be closed by the deadline")
        .unwrap();
    assert_eq!(n, 0);
    shutdown.shutdown();
}

#[tokio::test]
async fn test_idle_deadline_applies_between_keepalive_requests() {
    let (addr, shutdown, _stats, _task) =
        spawn_server("server:\n  idle_timeout_ms: 100\n").await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let response = do_request(&mut stream).await;
    assert!(response.starts_with(b"HTTP/1.1 200"));

    // Connection was kept alive, but no second request ever arrives
    let mut chunk = [0u8; 64];
    let n = timeout(Duration::from_secs(2), stream.read(&mut chunk))
        .await
        .expect("kept-alive connection should be closed once idle")
        .unwrap();
    assert_eq!(n, 0);
    shutdown.shutdown();
}

#[tokio::test]
async fn test_shutdown_with_no_connections_returns() {
    let (_addr, shutdown, _stats, task) = spawn_server("").await;
    shutdown.shutdown();
    timeout(Duration::from_secs(2), task)
        .await
        .expect("run should return after shutdown")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_grace_bounds_the_drain() {
    let (addr, shutdown, _stats, task) = spawn_server(
        "server:\n  idle_timeout_ms: 5000\n  shutdown_grace_ms: 100\n",
    )
    .await;

    // A connection that never sends anything holds a live slot
    let _idle = TcpStream::connect(addr).await.unwrap();
    sleep(Duration::from_millis(50)).await;

    shutdown.shutdown();
    timeout(Duration::from_secs(2), task)
        .await
        .expect("run should return once the grace deadline passes")
        .unwrap()
        .unwrap();
}
