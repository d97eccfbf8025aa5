mod net;

use anyhow::{anyhow, Result};
use clap::Parser;
use garagemon_core::config::Config;
use garagemon_server::Coordinator;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "garagemon",
    about = "Open and close the garage door over HTTP",
    version
)]
struct Cli {
    /// YAML config file
    #[arg(long, env = "GARAGEMON_CONFIG", default_value = "garagemon.yaml")]
    config_file: PathBuf,

    /// host:port to listen on
    #[arg(long, env = "GARAGEMON_HTTP", default_value = "localhost:8080")]
    http: String,

    /// Only listen on this network interface's address
    #[arg(long, env = "GARAGEMON_NET_INTERFACE")]
    net_interface: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config_file).map_err(|e| anyhow!("{e}"))?;

    let http = match cli.net_interface.as_deref() {
        Some(interface) if !interface.is_empty() => {
            net::restrict_to_interface(&cli.http, interface).map_err(|e| anyhow!("{e}"))?
        }
        _ => cli.http,
    };

    tracing::info!("garagemon starting in {} mode", config.mode);
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let coordinator = Coordinator::acquire(config)
            .await
            .map_err(|e| anyhow!("{e}"))?;
        coordinator
            .serve(&http, interrupted())
            .await
            .map_err(|e| anyhow!("{e}"))
    })
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("installing interrupt handler: {e}");
        std::future::pending::<()>().await;
    }
}
