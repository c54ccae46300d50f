//! End-to-end exercises of the photo hand-off over real localhost TCP:
//! round-trip integrity, echo-mismatch aborts, capture failure recovery,
//! unknown-command handling, and capture mutual exclusion.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use shutterd::capture::CaptureDevice;
use shutterd::client::PhotoClient;
use shutterd::config::ServerConfig;
use shutterd::server;

/// Camera returning the same frame on every trigger.
struct FixedCamera {
    frame: Vec<u8>,
    captures: Arc<AtomicUsize>,
}

#[async_trait]
impl CaptureDevice for FixedCamera {
    async fn capture(&mut self) -> anyhow::Result<Vec<u8>> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(self.frame.clone())
    }
}

/// Camera that plays back a fixed script of successes and failures.
struct ScriptedCamera {
    script: Vec<Option<Vec<u8>>>,
    next: usize,
}

#[async_trait]
impl CaptureDevice for ScriptedCamera {
    async fn capture(&mut self) -> anyhow::Result<Vec<u8>> {
        let step = self.script.get(self.next).cloned();
        self.next += 1;
        match step.flatten() {
            Some(frame) => Ok(frame),
            None => anyhow::bail!("device error: sensor not ready"),
        }
    }
}

/// Camera that holds the device for a while and records whether two
/// captures ever ran at the same time.
struct OverlapCamera {
    hold: Duration,
    in_capture: Arc<AtomicBool>,
    overlapped: Arc<AtomicBool>,
    captures: Arc<AtomicUsize>,
}

#[async_trait]
impl CaptureDevice for OverlapCamera {
    async fn capture(&mut self) -> anyhow::Result<Vec<u8>> {
        if self.in_capture.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        tokio::time::sleep(self.hold).await;
        self.captures.fetch_add(1, Ordering::SeqCst);
        self.in_capture.store(false, Ordering::SeqCst);
        Ok(vec![0x42; 2048])
    }
}

fn temp_dir(tag: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "shutterd-{}-{}-{}",
        tag,
        std::process::id(),
        nanos
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn test_pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Bind an ephemeral port, spawn the server on it, and hand back the
/// address plus a config pointed at a fresh output directory.
async fn spawn_server(
    camera: Box<dyn CaptureDevice>,
    tag: &str,
    chunk_size: usize,
) -> (SocketAddr, ServerConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = ServerConfig::default();
    config.photo_directory = temp_dir(&format!("{}-photos", tag));
    config.output_directory = temp_dir(&format!("{}-received", tag));
    config.metrics_address = None;
    config.settle_delay_ms = 0;
    config.chunk_size = chunk_size;
    config.io_timeout_secs = 5;

    let server_config = config.clone();
    tokio::spawn(async move {
        let _ = server::serve(listener, server_config, camera).await;
    });

    (addr, config)
}

async fn read_line(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).await.unwrap();
        assert!(n > 0, "connection closed mid-token");
        if byte[0] == b'\n' {
            break;
        }
        buf.push(byte[0]);
    }
    String::from_utf8(buf).unwrap()
}

async fn write_line(stream: &mut TcpStream, line: &str) {
    stream.write_all(line.as_bytes()).await.unwrap();
    stream.write_all(b"\n").await.unwrap();
}

#[tokio::test]
async fn round_trip_reproduces_exact_bytes() {
    let frame = test_pattern(500_000);
    let captures = Arc::new(AtomicUsize::new(0));
    let camera = Box::new(FixedCamera {
        frame: frame.clone(),
        captures: Arc::clone(&captures),
    });
    let (addr, config) = spawn_server(camera, "roundtrip", 1024).await;

    let mut client = PhotoClient::connect(&addr.to_string(), &config)
        .await
        .unwrap();
    let path = client.request_photo().await.unwrap().expect("photo expected");

    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("capture_") && name.ends_with(".jpg"));

    let received = std::fs::read(&path).unwrap();
    assert_eq!(received.len(), 500_000);
    assert_eq!(received, frame);

    // The server kept its own copy under the photo directory.
    let server_copy = std::fs::read(config.photo_directory.join(name)).unwrap();
    assert_eq!(server_copy, frame);
    assert_eq!(captures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn extreme_chunk_sizes_do_not_truncate_or_duplicate() {
    // chunk_size of 1 on a 317-byte photo.
    let frame = test_pattern(317);
    let camera = Box::new(FixedCamera {
        frame: frame.clone(),
        captures: Arc::new(AtomicUsize::new(0)),
    });
    let (addr, config) = spawn_server(camera, "chunk1", 1).await;
    let mut client = PhotoClient::connect(&addr.to_string(), &config)
        .await
        .unwrap();
    let path = client.request_photo().await.unwrap().unwrap();
    assert_eq!(std::fs::read(path).unwrap(), frame);

    // chunk_size far larger than the photo.
    let frame = test_pattern(100);
    let camera = Box::new(FixedCamera {
        frame: frame.clone(),
        captures: Arc::new(AtomicUsize::new(0)),
    });
    let (addr, config) = spawn_server(camera, "chunkbig", 64 * 1024).await;
    let mut client = PhotoClient::connect(&addr.to_string(), &config)
        .await
        .unwrap();
    let path = client.request_photo().await.unwrap().unwrap();
    assert_eq!(std::fs::read(path).unwrap(), frame);
}

#[tokio::test]
async fn capture_failure_reports_no_photo_and_session_survives() {
    let frame = test_pattern(4096);
    let camera = Box::new(ScriptedCamera {
        script: vec![None, Some(frame.clone())],
        next: 0,
    });
    let (addr, config) = spawn_server(camera, "devfail", 1024).await;

    let mut client = PhotoClient::connect(&addr.to_string(), &config)
        .await
        .unwrap();

    // First capture fails on the device: no photo, connection stays up.
    assert!(client.request_photo().await.unwrap().is_none());

    // Second request on the same connection succeeds.
    let path = client.request_photo().await.unwrap().expect("photo expected");
    assert_eq!(std::fs::read(path).unwrap(), frame);
}

#[tokio::test]
async fn size_echo_mismatch_aborts_without_payload() {
    let frame = test_pattern(12345);
    let camera = Box::new(FixedCamera {
        frame: frame.clone(),
        captures: Arc::new(AtomicUsize::new(0)),
    });
    let (addr, _config) = spawn_server(camera, "sizemismatch", 1024).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();

    // First exchange: echo a wrong size and expect the server to abort.
    write_line(&mut stream, "TAKE_PHOTO").await;
    let name = read_line(&mut stream).await;
    write_line(&mut stream, &name).await;
    let size_token = read_line(&mut stream).await;
    let size: u64 = size_token.parse().unwrap();
    write_line(&mut stream, &(size + 1).to_string()).await;

    // The server must be back in its command loop with no payload bytes in
    // flight: the next thing it sends is a fresh name token.
    write_line(&mut stream, "TAKE_PHOTO").await;
    let name = read_line(&mut stream).await;
    assert!(
        name.starts_with("capture_"),
        "expected a name token, got '{}'",
        name
    );
    write_line(&mut stream, &name).await;
    let size_token = read_line(&mut stream).await;
    assert_eq!(size_token.parse::<u64>().unwrap(), frame.len() as u64);
    write_line(&mut stream, &size_token).await;

    let mut payload = vec![0u8; frame.len()];
    stream.read_exact(&mut payload).await.unwrap();
    assert_eq!(payload, frame);
}

#[tokio::test]
async fn name_echo_mismatch_aborts_without_payload() {
    let frame = test_pattern(2000);
    let camera = Box::new(FixedCamera {
        frame: frame.clone(),
        captures: Arc::new(AtomicUsize::new(0)),
    });
    let (addr, _config) = spawn_server(camera, "namemismatch", 256).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();

    write_line(&mut stream, "TAKE_PHOTO").await;
    let name = read_line(&mut stream).await;
    write_line(&mut stream, &format!("{}x", name)).await;

    // Aborted transfer, live session: a new request runs to completion.
    write_line(&mut stream, "TAKE_PHOTO").await;
    let name = read_line(&mut stream).await;
    assert!(name.starts_with("capture_"));
    write_line(&mut stream, &name).await;
    let size_token = read_line(&mut stream).await;
    write_line(&mut stream, &size_token).await;

    let mut payload = vec![0u8; frame.len()];
    stream.read_exact(&mut payload).await.unwrap();
    assert_eq!(payload, frame);
}

#[tokio::test]
async fn unknown_command_closes_connection_without_capture() {
    let captures = Arc::new(AtomicUsize::new(0));
    let camera = Box::new(FixedCamera {
        frame: vec![1, 2, 3],
        captures: Arc::clone(&captures),
    });
    let (addr, _config) = spawn_server(camera, "unknowncmd", 1024).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    write_line(&mut stream, "SELF_DESTRUCT").await;

    let mut buf = [0u8; 1];
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(n, 0, "server should close the connection");
    assert_eq!(captures.load(Ordering::SeqCst), 0, "no capture side effect");
}

#[tokio::test]
async fn concurrent_requests_never_overlap_on_the_device() {
    let in_capture = Arc::new(AtomicBool::new(false));
    let overlapped = Arc::new(AtomicBool::new(false));
    let captures = Arc::new(AtomicUsize::new(0));
    let camera = Box::new(OverlapCamera {
        hold: Duration::from_millis(100),
        in_capture: Arc::clone(&in_capture),
        overlapped: Arc::clone(&overlapped),
        captures: Arc::clone(&captures),
    });
    let (addr, config) = spawn_server(camera, "mutex", 1024).await;

    let config_a = config.clone();
    let addr_text = addr.to_string();
    let a = {
        let addr_text = addr_text.clone();
        tokio::spawn(async move {
            let mut client = PhotoClient::connect(&addr_text, &config_a).await.unwrap();
            client.request_photo().await.unwrap().unwrap()
        })
    };
    let b = tokio::spawn(async move {
        let mut client = PhotoClient::connect(&addr_text, &config).await.unwrap();
        client.request_photo().await.unwrap().unwrap()
    });

    a.await.unwrap();
    b.await.unwrap();

    assert_eq!(captures.load(Ordering::SeqCst), 2);
    assert!(
        !overlapped.load(Ordering::SeqCst),
        "captures overlapped on the device"
    );
}
