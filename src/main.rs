use clap::Parser;
use tracing::info;

use shutterd::client;
use shutterd::config::ServerConfig;
use shutterd::metrics::count_stored_photos;
use shutterd::server;
use shutterd::startup::StartupValidator;

#[derive(Parser)]
#[command(name = "shutterd")]
#[command(about = "Photo hand-off server operations")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long, help = "Config file path")]
    config: Option<String>,

    #[arg(long, help = "Listen address (overrides config)")]
    listen: Option<String>,

    #[arg(long, help = "Photo directory path (overrides config)")]
    photo_dir: Option<String>,

    #[arg(long, help = "Output as JSON")]
    json: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Connect to a server and request photos interactively
    Client {
        #[arg(long, help = "Server address (overrides config)")]
        connect: Option<String>,

        #[arg(long, help = "Directory for received photos (overrides config)")]
        output_dir: Option<String>,
    },
    /// Show server status
    Status,
    /// Write a default configuration file
    GenerateConfig {
        #[arg(long, default_value = "shutterd.toml", help = "Config file path")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("shutterd=debug")
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = ServerConfig::load_or_create(cli.config.as_deref())?;

    // Override config with CLI args if provided
    if let Some(listen) = cli.listen {
        config.listen_address = listen;
    }
    if let Some(photo_dir) = cli.photo_dir {
        config.photo_directory = photo_dir.into();
    }

    // Ensure directories exist
    if let Err(e) = config.ensure_directories() {
        if cli.json {
            println!(
                "{}",
                serde_json::json!({"error": format!("Failed to create directories: {}", e)})
            );
        } else {
            eprintln!("❌ Failed to create directories: {}", e);
        }
        return Err(e);
    }

    match cli.command {
        Some(Commands::Client {
            connect,
            output_dir,
        }) => {
            if let Some(dir) = output_dir {
                config.output_directory = dir.into();
            }
            let addr = connect.unwrap_or_else(|| config.connect_address.clone());
            client::run_shell(&addr, &config).await
        }
        Some(Commands::Status) => {
            let photo_dir = config.photo_directory.to_string_lossy().to_string();
            let ready = config.photo_directory.exists();
            let stored = count_stored_photos(&config.photo_directory);

            if cli.json {
                let status = if ready {
                    serde_json::json!({
                        "status": "ready",
                        "photo_directory": photo_dir,
                        "listen_address": config.listen_address,
                        "stored_photos": stored
                    })
                } else {
                    serde_json::json!({
                        "status": "not_initialized"
                    })
                };
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("📊 Shutterd Server Status");
                println!("=========================");

                if !ready {
                    println!("❌ Status: Not initialized");
                    return Ok(());
                }

                println!("✅ Status: Ready");
                println!("   Photo directory: {}", photo_dir);
                println!("   Listen address: {}", config.listen_address);
                println!("   Stored photos: {}", stored);
            }
            Ok(())
        }
        Some(Commands::GenerateConfig { output }) => {
            let config = ServerConfig::default();
            match config.save(&output) {
                Ok(_) => {
                    if cli.json {
                        println!(
                            "{}",
                            serde_json::json!({
                                "success": true,
                                "config_file": output,
                                "message": "Default configuration file created"
                            })
                        );
                    } else {
                        println!("⚙️  Generate Configuration");
                        println!("========================");
                        println!("✅ Default configuration saved to: {}", output);
                        println!("   Edit the file to customize server settings");
                    }
                    Ok(())
                }
                Err(e) => {
                    if cli.json {
                        println!("{}", serde_json::json!({"error": e.to_string()}));
                    } else {
                        println!("⚙️  Generate Configuration");
                        println!("========================");
                        println!("❌ Failed to create config file: {}", e);
                    }
                    Err(e)
                }
            }
        }
        None => {
            // Normal server startup
            info!("Starting shutterd server on {}", config.listen_address);

            let validator = StartupValidator::new(&config);
            validator.validate_and_start()?;

            server::run(config).await
        }
    }
}
