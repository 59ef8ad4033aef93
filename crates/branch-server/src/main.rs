use std::path::PathBuf;

use anyhow::Context;
use branch_server::ServerConfig;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "branch-server")]
#[command(about = "Streaming proxy for branch conversations")]
#[command(version)]
struct Cli {
    /// Read settings from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Override BRANCH_SERVER_HOST
    #[arg(long)]
    host: Option<String>,

    /// Override BRANCH_SERVER_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(true))
        .init();

    let mut config = match &cli.env_file {
        Some(path) => ServerConfig::from_env_file(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => ServerConfig::from_env(),
    };
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    tracing::info!(
        model = %config.model,
        key_present = config.api_key.is_some(),
        "Proxy configured"
    );

    branch_server::run(config)
        .await
        .context("branch proxy stopped with an error")
}
