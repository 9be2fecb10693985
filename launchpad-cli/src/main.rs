//! Launchpad CLI
//!
//! Defines the deployment stack from the environment, synthesizes its
//! template and previews it locally.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "launchpad")]
#[command(about = "Static site build and deploy pipeline", long_about = None)]
struct Cli {
    /// Dotenv file loaded before reading the environment
    #[arg(long, env = "LAUNCHPAD_ENV_FILE")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so synthesized output can be piped
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "launchpad_cli=info,launchpad_core=info,launchpad_runner=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load(cli.env_file)?;
    handle_command(cli.command, &config).await
}
