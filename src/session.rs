use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::capture::{timestamp_name, CaptureDevice};
use crate::config::ServerConfig;
use crate::metrics::MetricsCollector;
use crate::protocol::wire::{
    recv_token, send_name, send_payload, send_size, send_token, with_deadline,
};
use crate::protocol::{ProtocolError, CMD_TAKE_PHOTO, NO_PHOTO};

/// The capture device shared across all sessions. One mutex serializes
/// device access system-wide regardless of how many connections are open.
pub type SharedCamera = Arc<Mutex<Box<dyn CaptureDevice>>>;

/// Server side of the photo hand-off: one per accepted connection.
///
/// The session loops on command tokens. `TAKE_PHOTO` runs one
/// capture-and-transfer cycle; any other token or a closed stream ends
/// the session. Echo mismatches abort only the current cycle.
pub struct Session {
    stream: TcpStream,
    camera: SharedCamera,
    config: Arc<ServerConfig>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Session {
    pub fn new(
        stream: TcpStream,
        camera: SharedCamera,
        config: Arc<ServerConfig>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            stream,
            camera,
            config,
            metrics,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            // No deadline here: an idle client between commands is fine.
            let command = match recv_token(&mut self.stream, self.config.buffer_size).await {
                Ok(token) => token,
                Err(ProtocolError::ConnectionClosed) => {
                    info!("Peer closed the connection");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read command: {}", e);
                    break;
                }
            };

            if command != CMD_TAKE_PHOTO {
                info!("Unknown command '{}', closing session", command);
                break;
            }

            if let Err(e) = self.handle_take_photo().await {
                if let Some(metrics) = &self.metrics {
                    metrics.record_aborted_transfer();
                }
                if e.is_fatal() {
                    warn!("Session ended mid-transfer: {}", e);
                    break;
                }
                // Aborts the transfer only; the connection stays open for
                // the next command.
                error!("Transfer aborted: {}", e);
            }
        }

        info!("Session ended");
        Ok(())
    }

    async fn handle_take_photo(&mut self) -> Result<(), ProtocolError> {
        let (name, data) = match self.capture_to_disk().await {
            Ok(captured) => captured,
            Err(e) => {
                error!("Capture failed: {:#}", e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_capture_failure();
                }
                // Device failure is reported, not fatal: no photo is sent
                // and the session keeps awaiting commands.
                send_token(&mut self.stream, NO_PHOTO).await?;
                return Ok(());
            }
        };

        let deadline = self.config.io_timeout();

        send_name(&mut self.stream, &name).await?;
        let echoed = with_deadline(
            deadline,
            recv_token(&mut self.stream, self.config.buffer_size),
        )
        .await?;
        if echoed != name {
            warn!("Name echo mismatch: sent '{}', got '{}'", name, echoed);
            return Err(ProtocolError::FrameMismatch { sent: name, echoed });
        }

        let size = data.len() as u64;
        send_size(&mut self.stream, size).await?;
        let echoed_size = with_deadline(
            deadline,
            recv_token(&mut self.stream, self.config.buffer_size),
        )
        .await?;
        if echoed_size != size.to_string() {
            warn!("Size echo mismatch: sent '{}', got '{}'", size, echoed_size);
            return Err(ProtocolError::FrameMismatch {
                sent: size.to_string(),
                echoed: echoed_size,
            });
        }

        send_payload(&mut self.stream, &data, self.config.chunk_size).await?;
        info!("Photo '{}' sent ({} bytes)", name, size);

        if let Some(metrics) = &self.metrics {
            metrics.record_photo_sent(size);
        }
        Ok(())
    }

    /// Take one still and persist it under the photo directory. The device
    /// lock covers capture and the local write; the network transfer runs
    /// after release so a slow client cannot hold up other captures.
    async fn capture_to_disk(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let mut camera = self.camera.lock().await;
        let data = camera.capture().await?;

        let name = timestamp_name();
        let path = self.config.photo_directory.join(&name);
        tokio::fs::write(&path, &data)
            .await
            .with_context(|| format!("failed to write capture to {:?}", path))?;
        info!("Captured '{}' ({} bytes)", name, data.len());

        if let Some(metrics) = &self.metrics {
            metrics.record_capture();
        }
        Ok((name, data))
    }
}
