use clap::Parser;
use cvn_pool::{PoolConfig, PoolNode};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// CVN Pool Node - Validator pool membership, era rotation and reputation tracking
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/pool.toml")]
    config: PathBuf,

    /// CVN chain WebSocket endpoint (overrides config file)
    #[arg(long)]
    chain_endpoint: Option<String>,

    /// Path to sr25519 secret URI file (overrides config file)
    #[arg(long)]
    keypair: Option<PathBuf>,

    /// Registry poll interval in seconds (overrides config file)
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Metrics server port (overrides config file)
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing subscriber
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("🚀 Starting CVN Pool Node");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = if args.config.exists() {
        info!("Loading configuration from {:?}", args.config);
        PoolConfig::from_file(&args.config)?
    } else {
        error!("Configuration file not found: {:?}", args.config);
        std::process::exit(1);
    };

    // Apply CLI overrides
    if let Some(endpoint) = args.chain_endpoint {
        info!("Overriding chain endpoint: {}", endpoint);
        config.chain_endpoint = endpoint;
    }

    if let Some(keypair) = args.keypair {
        info!("Overriding keypair path: {:?}", keypair);
        config.keypair_path = keypair;
    }

    if let Some(interval) = args.poll_interval {
        info!("Overriding poll interval: {}s", interval);
        config.poll.interval_secs = interval;
    }

    if let Some(port) = args.metrics_port {
        info!("Overriding metrics port: {}", port);
        config.metrics.port = port;
    }

    // Validate configuration
    config.validate()?;

    // Create and run the pool node
    info!("Initializing pool node...");
    let node = PoolNode::new(config).await?;

    info!("✅ Pool node initialized successfully");
    info!("🔄 Entering poll loop...");

    // Set up graceful shutdown handler
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    ctrlc::set_handler(move || {
        info!("Received shutdown signal (Ctrl+C)");
        let _ = shutdown_tx.try_send(());
    })?;

    // Run the node with shutdown handling
    tokio::select! {
        result = node.run() => {
            if let Err(e) = result {
                error!("Pool node error: {}", e);
                std::process::exit(1);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutting down pool node gracefully...");
        }
    }

    info!("👋 Pool node stopped");
    Ok(())
}
