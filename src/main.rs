//! Datalens - Main Entry Point

use clap::Parser;
use datalens::cli::{build_engine, execute, Cli};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "datalens=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let engine = build_engine(cli.config.as_deref())?;
    let report = execute(&engine, &cli.command)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
