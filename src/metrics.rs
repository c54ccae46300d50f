use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub uptime_seconds: u64,
    pub photos_captured: u64,
    pub photos_sent: u64,
    pub capture_failures: u64,
    pub aborted_transfers: u64,
    pub total_bytes_served: u64,
    pub active_connections: u64,
    pub stored_photos: u64,
}

pub struct MetricsCollector {
    start_time: std::time::SystemTime,
    captured: AtomicU64,
    sent: AtomicU64,
    capture_failures: AtomicU64,
    aborted_transfers: AtomicU64,
    bytes_served: AtomicU64,
    active_connections: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: std::time::SystemTime::now(),
            captured: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            capture_failures: AtomicU64::new(0),
            aborted_transfers: AtomicU64::new(0),
            bytes_served: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
        }
    }

    pub fn record_capture(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capture_failure(&self) {
        self.capture_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_photo_sent(&self, bytes: u64) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_served.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_aborted_transfer(&self) {
        self.aborted_transfers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, stored_photos: u64) -> Metrics {
        let uptime = self.start_time.elapsed().unwrap_or_default().as_secs();

        Metrics {
            uptime_seconds: uptime,
            photos_captured: self.captured.load(Ordering::Relaxed),
            photos_sent: self.sent.load(Ordering::Relaxed),
            capture_failures: self.capture_failures.load(Ordering::Relaxed),
            aborted_transfers: self.aborted_transfers.load(Ordering::Relaxed),
            total_bytes_served: self.bytes_served.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            stored_photos,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Count captures currently on disk; the metrics endpoint reports it
/// alongside the in-memory counters.
pub fn count_stored_photos(photo_dir: &PathBuf) -> u64 {
    std::fs::read_dir(photo_dir)
        .map(|entries| {
            entries
                .flatten()
                .filter(|e| e.file_name().to_string_lossy().ends_with(".jpg"))
                .count() as u64
        })
        .unwrap_or(0)
}

pub async fn start_metrics_server(
    addr: &str,
    metrics: Arc<MetricsCollector>,
    photo_dir: PathBuf,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on {}", addr);

    loop {
        let (mut socket, _) = listener.accept().await?;
        let metrics = Arc::clone(&metrics);
        let photo_dir = photo_dir.clone();

        tokio::spawn(async move {
            let mut buffer = [0; 1024];
            if let Ok(n) = socket.read(&mut buffer).await {
                let request = String::from_utf8_lossy(&buffer[..n]);

                if request.starts_with("GET /metrics") {
                    let stored = count_stored_photos(&photo_dir);
                    let metrics_data = metrics.get_metrics(stored);
                    let json = serde_json::to_string_pretty(&metrics_data).unwrap_or_default();

                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                        json.len(),
                        json
                    );

                    let _ = socket.write_all(response.as_bytes()).await;
                } else if request.starts_with("GET /health") {
                    let response = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK";
                    let _ = socket.write_all(response.as_bytes()).await;
                }
            }
        });
    }
}
