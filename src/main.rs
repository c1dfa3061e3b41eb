use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use a3s_inquisitor::cli::{Cli, Commands};
use a3s_inquisitor::config::InquisitorConfig;
use a3s_inquisitor::invocation::Invocation;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => InquisitorConfig::load(path)?,
        None => InquisitorConfig::discover()?,
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let mut ctx = Invocation::new();
    if let Some(secs) = cli.timeout_secs {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }
    tracing::debug!(name = %config.name, workflow = %ctx.workflow_id, "Starting");

    match cli.command {
        Commands::Ingest { store, input } => {
            a3s_inquisitor::cli::ingest::execute(&ctx, &config, &store, &input).await?;
        }
        Commands::Resolve {
            store,
            root,
            kind,
            names,
            direction,
        } => {
            a3s_inquisitor::cli::resolve::execute(
                &ctx, &config, &store, &root, kind, &names, direction,
            )
            .await?;
        }
        Commands::Info { store } => {
            a3s_inquisitor::cli::info::execute(&ctx, &store).await?;
        }
    }

    Ok(())
}
