use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::capture::{CaptureDevice, CommandCamera};
use crate::config::ServerConfig;
use crate::metrics::{start_metrics_server, MetricsCollector};
use crate::session::{Session, SharedCamera};

/// Start the server with the camera named in the configuration.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let camera: Box<dyn CaptureDevice> = Box::new(CommandCamera::new(
        config.camera_command.clone(),
        config.settle_delay(),
    ));
    run_with_camera(config, camera).await
}

pub async fn run_with_camera(
    config: ServerConfig,
    camera: Box<dyn CaptureDevice>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.listen_address).await?;
    info!("Server listening on {}", config.listen_address);
    serve(listener, config, camera).await
}

/// Accept loop over an already-bound listener: one session task per
/// connection, all sharing the capture device behind a single mutex.
pub async fn serve(
    listener: TcpListener,
    config: ServerConfig,
    camera: Box<dyn CaptureDevice>,
) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let camera: SharedCamera = Arc::new(Mutex::new(camera));
    let metrics = Arc::new(MetricsCollector::new());

    if let Some(metrics_addr) = config.metrics_address.clone() {
        let metrics_clone = Arc::clone(&metrics);
        let photo_dir = config.photo_directory.clone();
        tokio::spawn(async move {
            if let Err(e) = start_metrics_server(&metrics_addr, metrics_clone, photo_dir).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                info!("New connection from {}", peer);
                metrics.connection_opened();

                let camera_clone = Arc::clone(&camera);
                let config_clone = Arc::clone(&config);
                let metrics_clone = Arc::clone(&metrics);
                let metrics_for_cleanup = Arc::clone(&metrics);

                tokio::spawn(async move {
                    let session =
                        Session::new(socket, camera_clone, config_clone, Some(metrics_clone));
                    if let Err(e) = session.run().await {
                        error!("Session error for {}: {}", peer, e);
                    } else {
                        info!("Session completed for {}", peer);
                    }
                    metrics_for_cleanup.connection_closed();
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
