use anyhow::Result;
use tracing::info;

use crate::config::ServerConfig;

pub struct StartupValidator {
    config: ServerConfig,
}

impl StartupValidator {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn validate_and_start(&self) -> Result<()> {
        info!("🔍 Starting validation");

        info!("Step 1: Checking transfer limits...");
        self.verify_limits()?;
        info!("✅ Limits checked");

        info!("Step 2: Checking photo directory...");
        self.verify_photo_directory()?;
        info!("✅ Photo directory checked");

        info!("🎉 Validation complete");
        Ok(())
    }

    fn verify_limits(&self) -> Result<()> {
        if self.config.chunk_size == 0 {
            anyhow::bail!("chunk_size must be at least 1 byte");
        }
        if self.config.buffer_size == 0 {
            anyhow::bail!("buffer_size must be at least 1 byte");
        }
        Ok(())
    }

    fn verify_photo_directory(&self) -> Result<()> {
        let photo_dir = &self.config.photo_directory;

        if !photo_dir.exists() {
            info!("No photo directory yet - starting fresh");
            std::fs::create_dir_all(photo_dir)?;
        }

        // Probe write so a read-only mount fails now, not at first capture.
        let probe = photo_dir.join(".shutterd-probe");
        std::fs::write(&probe, b"probe")?;
        std::fs::remove_file(&probe)?;

        let entries = std::fs::read_dir(photo_dir)?;
        let mut count = 0;
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().ends_with(".jpg") {
                count += 1;
            }
        }

        info!("Found {} existing captures", count);
        Ok(())
    }
}
