//! Socket factory integration tests (TCP and UNIX).
//!
//! The listener is pre-bound on an ephemeral address; the Python fixture
//! worker dials back and identifies itself with the PID handshake frame.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use wirepool::protocol::{flags, Frame, VERSION_1};
use wirepool::{Error, Factory, Listener, Payload, SocketFactory, State, SyncWorker};

fn script(name: &str) -> String {
    format!("{}/tests/scripts/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn client(mode: &str, transport: &str, addr: &str) -> Command {
    let mut cmd = Command::new("python3");
    cmd.arg(script("client.py")).arg(mode).arg(transport).arg(addr);
    cmd
}

async fn tcp_factory(timeout: Duration) -> (SocketFactory, String) {
    let listener = Listener::bind_tcp("127.0.0.1:0").await.unwrap();
    let addr = listener.tcp_addr().unwrap().to_string();
    (SocketFactory::new(listener, timeout), addr)
}

#[tokio::test]
async fn test_tcp_start() {
    let (factory, addr) = tcp_factory(Duration::from_secs(60)).await;

    let process = factory
        .spawn_worker(client("echo", "tcp", &addr))
        .await
        .unwrap();
    assert_ne!(process.pid(), 0);
    assert_eq!(process.state().value(), State::Ready);

    let w = SyncWorker::from(process);
    let waiter = {
        let w = w.clone();
        tokio::spawn(async move { w.wait().await })
    };

    w.stop().await.unwrap();
    waiter.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_tcp_echo() {
    let (factory, addr) = tcp_factory(Duration::from_secs(60)).await;

    let process = factory
        .spawn_worker(client("echo", "tcp", &addr))
        .await
        .unwrap();
    let w = SyncWorker::from(process);

    let res = w.exec(&Payload::from_body(&b"hello"[..])).await.unwrap();
    assert_eq!(&res.body[..], b"hello");
    assert!(res.context.is_empty());
    assert_eq!(res.to_string(), "hello");
    assert_eq!(w.state().value(), State::Ready);

    w.stop().await.unwrap();
}

#[tokio::test]
async fn test_tcp_spawn_concurrent_workers() {
    let (factory, addr) = tcp_factory(Duration::from_secs(60)).await;

    // concurrent spawns must each get their own, PID-matched connection
    let (a, b) = tokio::join!(
        factory.spawn_worker(client("echo", "tcp", &addr)),
        factory.spawn_worker(client("echo", "tcp", &addr)),
    );
    let (a, b) = (SyncWorker::from(a.unwrap()), SyncWorker::from(b.unwrap()));
    assert_ne!(a.pid(), b.pid());

    let ra = a.exec(&Payload::from_body(&b"one"[..])).await.unwrap();
    let rb = b.exec(&Payload::from_body(&b"two"[..])).await.unwrap();
    assert_eq!(&ra.body[..], b"one");
    assert_eq!(&rb.body[..], b"two");

    a.stop().await.unwrap();
    b.stop().await.unwrap();
}

#[tokio::test]
async fn test_tcp_failboot() {
    let (factory, _addr) = tcp_factory(Duration::from_secs(5)).await;

    let mut cmd = Command::new("python3");
    cmd.arg(script("failboot.py"));

    let err = factory.spawn_worker(cmd).await.unwrap_err();
    assert!(matches!(err, Error::Spawn(_)), "got {err:?}");
    assert!(err.to_string().contains("exited during boot"), "got {err}");
}

#[tokio::test]
async fn test_tcp_timeout() {
    let (factory, addr) = tcp_factory(Duration::from_millis(1)).await;

    let mut cmd = Command::new("python3");
    cmd.arg(script("slow-client.py"))
        .arg("echo")
        .arg("tcp")
        .arg("500")
        .arg(&addr);

    let err = factory.spawn_worker(cmd).await.unwrap_err();
    assert!(
        err.to_string().contains("context deadline exceeded"),
        "got {err}"
    );
}

#[tokio::test]
async fn test_tcp_broken_worker() {
    let (factory, addr) = tcp_factory(Duration::from_secs(60)).await;

    let process = factory
        .spawn_worker(client("broken", "tcp", &addr))
        .await
        .unwrap();
    let w = SyncWorker::from(process);

    let waiter = {
        let w = w.clone();
        tokio::spawn(async move { w.wait().await })
    };

    let err = w.exec(&Payload::from_body(&b"hello"[..])).await.unwrap_err();
    assert!(matches!(err, Error::Network(_)), "got {err:?}");

    let wait_err = waiter.await.unwrap().unwrap_err();
    assert!(matches!(wait_err, Error::ChildExit(_)), "got {wait_err:?}");

    w.stop().await.unwrap();
}

#[tokio::test]
async fn test_tcp_exec_ttl_kills_worker() {
    let (factory, addr) = tcp_factory(Duration::from_secs(60)).await;

    let process = factory
        .spawn_worker(client("slow-echo", "tcp", &addr))
        .await
        .unwrap();
    let w = SyncWorker::from(process);

    let err = w
        .exec_with_ttl(Duration::from_millis(1), &Payload::from_body(&b"hello"[..]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExecTTL { .. }), "got {err:?}");
    assert_eq!(w.state().value(), State::Killed);
}

#[tokio::test]
async fn test_unmatched_connection_is_closed() {
    let (factory, addr) = tcp_factory(Duration::from_secs(5)).await;

    // dial the factory pretending to be a worker nobody spawned
    let mut stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
    let mut fr = Frame::new();
    fr.write_version(VERSION_1);
    fr.write_flags(flags::CONTROL);
    let body = br#"{"pid":4294000000}"#;
    fr.write_payload_len(body.len() as u32);
    fr.write_payload(body);
    fr.write_crc();
    let mut wire = bytes::BytesMut::new();
    fr.encode_into(&mut wire);
    stream.write_all(&wire).await.unwrap();

    // the dispatch step finds no slot and closes the connection
    let mut buf = [0u8; 1];
    let n = stream.read(&mut buf).await.unwrap_or(0);
    assert_eq!(n, 0);

    factory.close().await.unwrap();
}

#[tokio::test]
async fn test_close_fails_pending_spawns() {
    let (factory, addr) = tcp_factory(Duration::from_secs(2)).await;
    factory.close().await.unwrap();

    // the child cannot reach the dead listener; spawn must error out
    let err = factory
        .spawn_worker(client("echo", "tcp", &addr))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Spawn(_)), "got {err:?}");
}

#[cfg(unix)]
mod unix_socket {
    use super::*;

    fn sock_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("wirepool-{tag}-{}.sock", std::process::id()))
    }

    #[tokio::test]
    async fn test_unix_echo() {
        let path = sock_path("echo");
        let listener = Listener::bind_unix(&path).await.unwrap();
        let factory = SocketFactory::new(listener, Duration::from_secs(60));

        let process = factory
            .spawn_worker(client("echo", "unix", path.to_str().unwrap()))
            .await
            .unwrap();
        let w = SyncWorker::from(process);

        let res = w.exec(&Payload::from_body(&b"hello"[..])).await.unwrap();
        assert_eq!(&res.body[..], b"hello");
        assert!(res.context.is_empty());

        w.stop().await.unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_unix_timeout() {
        let path = sock_path("timeout");
        let listener = Listener::bind_unix(&path).await.unwrap();
        let factory = SocketFactory::new(listener, Duration::from_millis(1));

        let mut cmd = Command::new("python3");
        cmd.arg(script("slow-client.py"))
            .arg("echo")
            .arg("unix")
            .arg("500")
            .arg(path.to_str().unwrap());

        let err = factory.spawn_worker(cmd).await.unwrap_err();
        assert!(
            err.to_string().contains("context deadline exceeded"),
            "got {err}"
        );
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_unix_failboot() {
        let path = sock_path("failboot");
        let listener = Listener::bind_unix(&path).await.unwrap();
        let factory = SocketFactory::new(listener, Duration::from_secs(5));

        let mut cmd = Command::new("python3");
        cmd.arg(script("failboot.py"));

        let err = factory.spawn_worker(cmd).await.unwrap_err();
        assert!(matches!(err, Error::Spawn(_)), "got {err:?}");
        let _ = std::fs::remove_file(&path);
    }
}
