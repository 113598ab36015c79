//! The naming server binary.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dfs_marmot::config::NamingConfig;
use dfs_marmot::NamingServer;

/// The naming server of the distributed file system.
#[derive(Parser)]
#[command(name = "dfs-naming", version)]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the client service port.
    #[arg(long)]
    service_port: Option<u16>,

    /// Override the storage-server registration port.
    #[arg(long)]
    registration_port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match NamingConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("dfs-naming: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => NamingConfig::default(),
    };
    if let Some(port) = args.service_port {
        config.service_port = port;
    }
    if let Some(port) = args.registration_port {
        config.registration_port = port;
    }

    let service = SocketAddr::new(config.bind, config.service_port);
    let registration = SocketAddr::new(config.bind, config.registration_port);
    let server = match NamingServer::start(service, registration).await {
        Ok(server) => server,
        Err(err) => {
            eprintln!("dfs-naming: {err}");
            return ExitCode::FAILURE;
        }
    };

    let _ = tokio::signal::ctrl_c().await;
    server.stop().await;
    ExitCode::SUCCESS
}
