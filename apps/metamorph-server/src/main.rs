use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use metamorph_config::load_config;
use metamorph_server::run_server;

#[derive(Debug, Parser)]
#[command(name = "metamorph-server")]
struct Args {
    /// Path to a metamorph.yaml; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the configured listen address
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level)),
        )
        .init();

    run_server(config).await
}
