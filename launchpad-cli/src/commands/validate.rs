//! Validate command

use anyhow::{Result, bail};
use colored::*;

use launchpad_core::{DefinitionError, define_stack};

use crate::config::Config;

pub fn validate(config: &Config) -> Result<()> {
    let stack_config = config.stack_config()?;

    match define_stack(&stack_config) {
        Ok(stack) => {
            println!(
                "{} {}",
                "✓ Stack is valid:".green().bold(),
                stack.name().cyan()
            );
            Ok(())
        }
        Err(DefinitionError::Validation(report)) => {
            println!(
                "{}",
                format!("✗ {} violation(s):", report.violations.len())
                    .red()
                    .bold()
            );
            for violation in &report.violations {
                println!("  {} {}", "▸".red(), violation);
            }
            bail!("Stack failed validation")
        }
        Err(e) => Err(e.into()),
    }
}
