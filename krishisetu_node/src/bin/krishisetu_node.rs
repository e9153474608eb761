use anyhow::{Context, Result};
use clap::Parser;
use krishisetu_node::{
    api::{ApiServer, AppState},
    config::StorageBackend,
    storage, NodeConfig, TraceabilityService,
};
use log::{info, warn};
use std::path::PathBuf;

/// KrishiSetu Node Arguments
#[derive(Parser)]
#[clap(name = "krishisetu-node")]
#[clap(about = "KrishiSetu Node - farm-to-consumer product traceability API")]
struct Args {
    /// Path to a YAML or TOML configuration file
    #[clap(long)]
    config: Option<PathBuf>,

    /// Address to bind the API to
    #[clap(long)]
    host: Option<String>,

    /// API port to listen on
    #[clap(long)]
    port: Option<u16>,

    /// Storage backend
    #[clap(long, value_enum)]
    storage: Option<StorageBackend>,

    /// Fail requests instead of answering from the simulated chain
    #[clap(long)]
    no_fallback: bool,

    /// Print the effective configuration as YAML and exit
    #[clap(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = NodeConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(backend) = args.storage {
        config.storage.backend = backend;
    }
    if args.no_fallback {
        config.ledger.fallback_enabled = false;
    }

    if args.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let store = storage::open(&config.storage).context("failed to open storage")?;
    info!("Using {} storage backend", store.backend_name());
    if !config.ledger.fallback_enabled {
        warn!("Simulated chain fallback is disabled");
    }

    let service = TraceabilityService::new(store, &config);
    ApiServer::new(config.bind_address(), AppState::new(service))
        .serve()
        .await
}
