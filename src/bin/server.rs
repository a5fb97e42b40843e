//! RailYard HTTP server

use clap::Parser;
use railyard::RailyardConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "railyard-server")]
#[command(about = "Serve the RailYard canvas and generation API")]
struct Cli {
    /// Config file (defaults to railyard.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("railyard=info")))
        .init();

    let cli = Cli::parse();
    let mut config = RailyardConfig::load_from(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    railyard::server::serve(config).await
}
