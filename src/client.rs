use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::protocol::wire::{
    recv_name, recv_payload, recv_size, send_token, with_deadline,
};
use crate::protocol::{ProtocolError, CMD_TAKE_PHOTO, MAX_PHOTO_SIZE, NO_PHOTO};

/// Client side of the photo hand-off: one connection, strictly sequential
/// request/response, no pipelining.
pub struct PhotoClient {
    stream: TcpStream,
    output_dir: PathBuf,
    buffer_size: usize,
    chunk_size: usize,
    deadline: Option<Duration>,
}

impl PhotoClient {
    pub async fn connect(addr: &str, config: &ServerConfig) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("failed to connect to {}", addr))?;
        info!("Connected to {}", addr);

        Ok(Self {
            stream,
            output_dir: config.output_directory.clone(),
            buffer_size: config.buffer_size,
            chunk_size: config.chunk_size,
            deadline: config.io_timeout(),
        })
    }

    /// Run one full capture request. Returns the saved path, or `None` when
    /// the server reported that capture failed and no photo was sent.
    ///
    /// The name and size are echoed back verbatim; mismatch detection lives
    /// on the server side of this exchange.
    pub async fn request_photo(&mut self) -> Result<Option<PathBuf>> {
        send_token(&mut self.stream, CMD_TAKE_PHOTO).await?;

        let name = with_deadline(
            self.deadline,
            recv_name(&mut self.stream, self.buffer_size),
        )
        .await?;
        if name == NO_PHOTO {
            warn!("Server reported capture failure, no photo sent");
            return Ok(None);
        }
        send_token(&mut self.stream, &name).await?;

        let (size, raw_size) = with_deadline(
            self.deadline,
            recv_size(&mut self.stream, self.buffer_size),
        )
        .await?;
        if size > MAX_PHOTO_SIZE {
            return Err(ProtocolError::PhotoTooLarge(size).into());
        }
        send_token(&mut self.stream, &raw_size).await?;

        let data = with_deadline(
            self.deadline,
            recv_payload(&mut self.stream, size, self.chunk_size),
        )
        .await?;

        // The name came off the wire; only its final component may pick
        // the on-disk location.
        let file_name = Path::new(&name)
            .file_name()
            .and_then(|n| n.to_str())
            .context("unusable file name from server")?;
        let path = self.output_dir.join(file_name);
        tokio::fs::write(&path, &data)
            .await
            .with_context(|| format!("failed to write photo to {:?}", path))?;

        info!("Saved '{}' ({} bytes)", path.display(), data.len());
        Ok(Some(path))
    }
}

/// Interactive control loop: prompt on stdin, one request per command.
pub async fn run_shell(addr: &str, config: &ServerConfig) -> Result<()> {
    tokio::fs::create_dir_all(&config.output_directory).await?;
    let mut client = PhotoClient::connect(addr, config).await?;

    println!("📷 Connected to {}", addr);
    println!("   Commands: photo (p) = request capture, quit (q) = exit");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("shutterd> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "photo" | "p" => match client.request_photo().await {
                Ok(Some(path)) => println!("✅ Saved {}", path.display()),
                Ok(None) => println!("⚠️  No photo sent (capture failed on the server)"),
                Err(e) => {
                    println!("❌ Failed to receive complete photo: {}", e);
                    let fatal = e
                        .downcast_ref::<ProtocolError>()
                        .map_or(false, ProtocolError::is_fatal);
                    if fatal {
                        println!("   Connection lost, exiting");
                        break;
                    }
                }
            },
            "quit" | "q" | "exit" => break,
            "" => continue,
            other => println!("Unknown command '{}'", other),
        }
    }

    println!("👋 Session closed");
    Ok(())
}
