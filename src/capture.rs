use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use tracing::debug;

/// A device that produces one still image per invocation.
///
/// Implementations own the hardware; serialization is the caller's job.
/// The server keeps the device behind a single mutex so at most one
/// capture is in progress system-wide.
#[async_trait]
pub trait CaptureDevice: Send {
    async fn capture(&mut self) -> Result<Vec<u8>>;
}

/// Capture device that shells out to an external still-capture command
/// (rpicam-still and friends) expected to write one JPEG to stdout.
pub struct CommandCamera {
    argv: Vec<String>,
    settle_delay: Duration,
}

impl CommandCamera {
    pub fn new(argv: Vec<String>, settle_delay: Duration) -> Self {
        Self { argv, settle_delay }
    }
}

#[async_trait]
impl CaptureDevice for CommandCamera {
    async fn capture(&mut self) -> Result<Vec<u8>> {
        // Fixed settle delay so the sensor stabilizes before triggering.
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let (program, args) = self
            .argv
            .split_first()
            .context("camera command is empty")?;

        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .with_context(|| format!("failed to run capture command '{}'", program))?;

        if !output.status.success() {
            anyhow::bail!(
                "capture command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        if output.stdout.is_empty() {
            anyhow::bail!("capture command produced no image data");
        }

        debug!("Captured {} bytes from '{}'", output.stdout.len(), program);
        Ok(output.stdout)
    }
}

/// Timestamp-derived capture file name, e.g. `capture_20240101-120000.jpg`.
pub fn timestamp_name() -> String {
    format!("capture_{}.jpg", Local::now().format("%Y%m%d-%H%M%S"))
}
