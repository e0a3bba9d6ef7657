use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kgnorm::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Run {
            inputs,
            output,
            strict,
        } => kgnorm::cli::run::run(config, &inputs, output.as_deref(), strict).await,
        Commands::Clean { file } => kgnorm::cli::clean::run(config, &file).await,
        Commands::CheckConfig => kgnorm::cli::config::run_check(config),
        Commands::Catalog => kgnorm::cli::config::run_catalog(config),
    }
}
