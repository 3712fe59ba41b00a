//! gatekeeper service entry point.

mod cli;

use clap::Parser;
use cli::{Cli, LogFormat};
use gatekeeper::GateBuilder;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(&cli);

    let config = cli.into_config()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        issuer = %config.issuer,
        workers = config.workers,
        "starting gatekeeper"
    );

    let mut gate = GateBuilder::new(config).build().await?;
    gate.run().await?;

    info!("gatekeeper stopped");
    Ok(())
}

/// Initialize the tracing subscriber from the CLI's level and format.
///
/// `RUST_LOG` takes precedence over `--log-level` for the filter; the format
/// defaults to human-readable text, with JSON for log collectors.
fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match cli.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}
