#![warn(missing_docs)]

//! filer-replicate: mirror filer changes into a sink.

use anyhow::Result;
use clap::Parser;
use filer_repl::cli::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    if let Err(e) = cli.run().await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
