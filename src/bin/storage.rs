//! The storage server binary.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dfs_marmot::config::StorageConfig;
use dfs_marmot::StorageServer;

/// A storage server of the distributed file system.
#[derive(Parser)]
#[command(name = "dfs-storage", version)]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the local directory the served files live under.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Override the naming server's registration endpoint.
    #[arg(long)]
    naming: Option<SocketAddr>,

    /// Override the address other hosts reach this server at.
    #[arg(long)]
    advertise: Option<IpAddr>,

    /// Override the data-plane port; 0 selects an ephemeral port.
    #[arg(long)]
    storage_port: Option<u16>,

    /// Override the control-plane port; 0 selects an ephemeral port.
    #[arg(long)]
    command_port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match StorageConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("dfs-storage: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => StorageConfig::default(),
    };
    if let Some(root) = args.root {
        config.root = root;
    }
    if let Some(naming) = args.naming {
        config.naming = naming;
    }
    if let Some(advertise) = args.advertise {
        config.advertise = advertise;
    }
    if let Some(port) = args.storage_port {
        config.storage_port = port;
    }
    if let Some(port) = args.command_port {
        config.command_port = port;
    }

    let storage_addr = SocketAddr::new(config.bind, config.storage_port);
    let command_addr = SocketAddr::new(config.bind, config.command_port);
    let server =
        match StorageServer::start(config.root, storage_addr, command_addr, config.advertise, config.naming).await {
            Ok(server) => server,
            Err(err) => {
                eprintln!("dfs-storage: {err}");
                return ExitCode::FAILURE;
            }
        };

    let _ = tokio::signal::ctrl_c().await;
    server.stop().await;
    ExitCode::SUCCESS
}
