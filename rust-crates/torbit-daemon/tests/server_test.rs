//! End-to-end tests of the acceptor: config → listener → bridges → coordinator

use std::time::Duration;

use tempfile::tempdir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UnixStream};
use tokio_util::sync::CancellationToken;
use torbit_broadcaster::Coordinator;
use torbit_daemon::config::{DaemonConfig, Protocol};
use torbit_daemon::server::{ChatListener, ChatServer};

fn tcp_config() -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.greeting = "name? ".to_string();
    config.room_label = "Test Room".to_string();
    config
}

/// Read until a line ending with `suffix` arrives
async fn expect_line<R>(reader: &mut R, suffix: &str) -> String
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    for _ in 0..20 {
        let mut line = String::new();
        let read = tokio::time::timeout(Duration::from_millis(500), reader.read_line(&mut line))
            .await
            .expect("timed out waiting for line")
            .unwrap();
        assert!(read > 0, "connection closed while waiting for {:?}", suffix);
        if line.trim_end().ends_with(suffix) {
            return line;
        }
    }
    panic!("never received line ending with {:?}", suffix);
}

#[tokio::test]
async fn test_tcp_server_relays_messages() {
    let config = tcp_config();
    let shutdown = CancellationToken::new();
    let (coordinator, coordinator_task) =
        Coordinator::spawn(config.coordinator_config(), shutdown.clone());

    let listener = ChatListener::bind(&config).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = ChatServer::new(listener, coordinator.clone(), config.bridge_config(), shutdown.clone());
    let server_task = tokio::spawn(async move { server.run().await });

    let stream = TcpStream::connect(&addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half.write_all(b"alice\n").await.unwrap();
    // greeting has no newline, so it prefixes the first line
    let first = expect_line(&mut reader, ": alice joined Test Room").await;
    assert!(first.starts_with("name? TorbitBot "));

    write_half.write_all(b"hello\n").await.unwrap();
    let line = expect_line(&mut reader, ": hello").await;
    assert!(line.starts_with("alice "));

    assert_eq!(coordinator.roster().await.unwrap(), vec!["alice"]);

    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(2), server_task)
        .await
        .expect("server must stop after shutdown")
        .unwrap();
    assert!(result.is_ok());
    coordinator_task.await.unwrap();
}

#[tokio::test]
async fn test_unix_server_secures_and_removes_socket() {
    let temp_dir = tempdir().unwrap();
    let socket_path = temp_dir.path().join("run").join("chat.sock");

    let mut config = tcp_config();
    config.server.protocol = Protocol::Unix;
    config.server.socket_path = socket_path.clone();

    let shutdown = CancellationToken::new();
    let (coordinator, _coordinator_task) =
        Coordinator::spawn(config.coordinator_config(), shutdown.clone());

    let listener = ChatListener::bind(&config).await.unwrap();
    assert!(socket_path.exists());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&socket_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let server = ChatServer::new(listener, coordinator, config.bridge_config(), shutdown.clone());
    let server_task = tokio::spawn(async move {
        let result = server.run().await;
        drop(server);
        result
    });

    let stream = UnixStream::connect(&socket_path).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    write_half.write_all(b"bob\n").await.unwrap();
    expect_line(&mut reader, ": bob joined Test Room").await;

    shutdown.cancel();
    server_task.await.unwrap().unwrap();
    assert!(!socket_path.exists());
}

#[tokio::test]
async fn test_stale_socket_is_replaced() {
    let temp_dir = tempdir().unwrap();
    let socket_path = temp_dir.path().join("chat.sock");
    std::fs::write(&socket_path, b"stale").unwrap();

    let mut config = tcp_config();
    config.server.protocol = Protocol::Unix;
    config.server.socket_path = socket_path.clone();

    let listener = ChatListener::bind(&config).await.unwrap();
    assert_eq!(listener.local_addr().unwrap(), socket_path.display().to_string());
}

#[tokio::test]
async fn test_bind_conflict_is_an_error() {
    let config = tcp_config();
    let first = ChatListener::bind(&config).await.unwrap();

    let mut taken = config.clone();
    let addr = first.local_addr().unwrap();
    taken.server.port = addr.rsplit(':').next().unwrap().parse().unwrap();

    let err = ChatListener::bind(&taken).await.err().expect("port already bound");
    assert!(err.to_string().contains("Failed to listen on"));
}
