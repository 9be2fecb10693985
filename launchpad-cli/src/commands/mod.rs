//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod describe;
mod preview;
mod synth;
mod validate;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize the deployment template
    Synth {
        /// Write the template to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Write deploy-time parameter values to a file
        #[arg(long)]
        parameters_out: Option<PathBuf>,

        /// Emit compact JSON
        #[arg(long)]
        compact: bool,
    },
    /// Define the stack and check its invariants
    Validate,
    /// Summarize stages, artifacts and distribution rules
    Describe,
    /// Run the pipeline locally and request paths from the edge preview
    Preview {
        /// Working tree standing in for the watched branch
        #[arg(short, long, env = "LAUNCHPAD_SOURCE_DIR")]
        source_dir: PathBuf,

        /// Directory of the working tree holding build output
        #[arg(short, long, default_value = "build")]
        build_dir: String,

        /// Paths to request after deploying (repeatable)
        #[arg(short, long = "path", default_value = "/")]
        paths: Vec<String>,

        /// Last revision deployed; the run is skipped while the branch is still there
        #[arg(long)]
        since: Option<String>,
    },
}

/// Handle a CLI command
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Synth {
            out,
            parameters_out,
            compact,
        } => synth::synth(config, out, parameters_out, compact),
        Commands::Validate => validate::validate(config),
        Commands::Describe => describe::describe(config),
        Commands::Preview {
            source_dir,
            build_dir,
            paths,
            since,
        } => preview::preview(config, source_dir, build_dir, paths, since).await,
    }
}
