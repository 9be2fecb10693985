//! Configuration module
//!
//! Loads the dotenv file, if any, and reads the stack configuration from the
//! resulting environment.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info};

use launchpad_core::StackConfig;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Dotenv file that was loaded, if any
    pub env_file: Option<PathBuf>,
}

impl Config {
    /// Loads `env_file` when given, otherwise a `.env` in the working
    /// directory if one exists
    pub fn load(env_file: Option<PathBuf>) -> Result<Self> {
        let env_file = match env_file {
            Some(path) => {
                dotenvy::from_path(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?;
                Some(path)
            }
            None => match dotenvy::dotenv() {
                Ok(path) => Some(path),
                Err(e) if e.not_found() => None,
                Err(e) => return Err(e).context("Failed to load .env"),
            },
        };

        match &env_file {
            Some(path) => info!("Loaded environment from {}", path.display()),
            None => debug!("No .env file found"),
        }
        Ok(Self { env_file })
    }

    /// Stack configuration read from the environment
    pub fn stack_config(&self) -> Result<StackConfig> {
        debug!("Reading stack configuration (env file: {:?})", self.env_file);
        StackConfig::from_env().context("Invalid stack configuration")
    }
}
