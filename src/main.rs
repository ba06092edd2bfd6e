use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use magnet_bridge::{Config, MagnetBridge, run_with_shutdown};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Watch RSS feeds for magnet links and send them to a cloud drive's offline downloader
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file (defaults apply when omitted)
    #[arg(short, long, env = "MAGNET_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the API bind address
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,
}

fn set_up_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("magnet_bridge=info,tower_http=info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    set_up_logging();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "magnet-bridge stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> magnet_bridge::Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            Config::load(path)?
        }
        None => Config::default(),
    };
    if let Some(bind) = args.bind {
        config.api.bind_address = bind;
    }

    let bridge = MagnetBridge::new(config).await?;
    run_with_shutdown(bridge).await
}
