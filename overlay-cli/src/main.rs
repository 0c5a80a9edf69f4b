use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
use cli::{Cli, Commands};

/// Initialize stderr logging from `--log-level`, then `RUST_LOG`, then `warn`
fn init_simple_tracing(log_level: Option<&String>) -> Result<()> {
    let env_filter = match log_level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| {
            eprintln!("Invalid log level '{}', falling back to 'warn'", level);
            EnvFilter::new("warn")
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    debug!("Simple tracing initialized");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_simple_tracing(cli.log_level.as_ref())?;

    let output = match &cli.command {
        Commands::Features { dir } => commands::features(dir).await?,
        Commands::Resolve {
            dir,
            base,
            key,
            features,
        } => commands::resolve(dir, base.as_deref(), key.as_deref(), features).await?,
        Commands::Dump { dir, base } => commands::dump(dir, base.as_deref()).await?,
    };

    println!("{}", output);
    Ok(())
}
