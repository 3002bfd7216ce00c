use anyhow::Context;
use clap::Parser;
use retry_test_proxy::config::Config;
use retry_test_proxy::proxy::ProxyServer;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "retry-test-proxy")]
#[command(author, version, about = "Reverse proxy that injects scripted retry tests into storage API traffic")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(
        short,
        long,
        default_value = "./configs/config.yaml",
        env = "RETRY_PROXY_CONFIG"
    )]
    config_path: PathBuf,

    /// Override the listen port from the configuration file
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the graceful shutdown timeout in seconds
    #[arg(long)]
    shutdown_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::from_file(&args.config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            args.config_path.display()
        )
    })?;

    if let Some(port) = args.port {
        config.listen.port = port;
    }
    if let Some(timeout) = args.shutdown_timeout {
        config.shutdown_timeout_secs = timeout;
    }
    config.validate()?;

    info!(
        config = %args.config_path.display(),
        target = %config.target_base(),
        control_plane = %config.control_plane_host(),
        "Starting retry test proxy"
    );

    let server = ProxyServer::new(config)?;
    server.run().await
}
