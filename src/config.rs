use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::protocol::{DEFAULT_BUFFER_SIZE, DEFAULT_CHUNK_SIZE};

pub const SHUTTERD_PORT: u16 = 5025;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_address: String,
    /// Metrics/health endpoint; omit to disable.
    pub metrics_address: Option<String>,
    pub connect_address: String,
    pub photo_directory: PathBuf,
    pub output_directory: PathBuf,
    /// Cap on a single text token read from the wire.
    pub buffer_size: usize,
    /// Per-read/per-write cap for payload bytes.
    pub chunk_size: usize,
    /// Sensor settle delay applied before each capture trigger.
    pub settle_delay_ms: u64,
    /// Deadline for mid-exchange reads; 0 disables timeouts entirely.
    pub io_timeout_secs: u64,
    /// External still-capture command, expected to write one JPEG to stdout.
    pub camera_command: Vec<String>,
    pub auto_create_directories: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: format!("0.0.0.0:{}", SHUTTERD_PORT),
            metrics_address: Some(format!("0.0.0.0:{}", SHUTTERD_PORT + 1)),
            connect_address: format!("127.0.0.1:{}", SHUTTERD_PORT),
            photo_directory: PathBuf::from("photos"),
            output_directory: PathBuf::from("Detection_Photos"),
            buffer_size: DEFAULT_BUFFER_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            settle_delay_ms: 2000,
            io_timeout_secs: 30,
            camera_command: vec![
                "rpicam-still".to_string(),
                "--nopreview".to_string(),
                "--immediate".to_string(),
                "--output".to_string(),
                "-".to_string(),
            ],
            auto_create_directories: true,
        }
    }
}

impl ServerConfig {
    pub fn load_or_create(config_path: Option<&str>) -> Result<Self> {
        let config_file = config_path.unwrap_or("shutterd.toml");

        if std::path::Path::new(config_file).exists() {
            let content = std::fs::read_to_string(config_file)?;
            let config: ServerConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save(config_file)?;
            Ok(config)
        }
    }

    pub fn save(&self, config_path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        if self.auto_create_directories {
            for dir in [&self.photo_directory, &self.output_directory] {
                if !dir.exists() {
                    std::fs::create_dir_all(dir)?;
                    tracing::info!("Created directory: {:?}", dir);
                }
            }
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        if self.io_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.io_timeout_secs))
        }
    }
}
