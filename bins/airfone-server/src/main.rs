use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use airfone_registry::transport::TransportConfig;
use airfone_registry::{RegistryServer, ServerConfig};

/// Airfone service registry server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML); built-in defaults when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// TCP port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Unix socket path to listen on (overrides config)
    #[cfg(unix)]
    #[arg(long, value_name = "PATH", conflicts_with = "port")]
    unix: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => ServerConfig::default(),
    };

    if let Some(port) = args.port {
        config.server.transport = TransportConfig::tcp(port);
    }
    #[cfg(unix)]
    if let Some(path) = &args.unix {
        config.server.transport = TransportConfig::unix_socket(path);
    }

    let level = if args.debug {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    initialize_logging(level);

    info!("Starting Airfone registry");
    match &args.config {
        Some(path) => info!("Config file: {}", path),
        None => info!("No config file, using defaults"),
    }
    info!(
        heartbeat = ?config.registry.heartbeat_interval,
        valid = ?config.registry.valid_window,
        pending = ?config.registry.pending_threshold,
        dropped = ?config.registry.dropped_threshold,
        "Registry timing windows"
    );

    let server = RegistryServer::from_config(&config);
    server.run_until(shutdown_signal()).await?;

    info!("Registry shut down successfully");
    Ok(())
}

fn initialize_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();
}

async fn shutdown_signal() {
    use tokio::signal;

    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM signal"),
                    _ = sigint.recv() => info!("Received SIGINT signal"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to install signal handlers, falling back to Ctrl+C");
            }
        }
    }

    if signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C signal");
    }
}
