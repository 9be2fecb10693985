//! Synth command
//!
//! Defines the stack and writes its template. The source token is never part
//! of the template; it goes to the parameters file when one is requested.

use anyhow::{Context, Result, bail};
use colored::*;
use std::path::PathBuf;

use launchpad_core::template::parameter_values;
use launchpad_core::{define_stack, synthesize};

use crate::config::Config;

pub fn synth(
    config: &Config,
    out: Option<PathBuf>,
    parameters_out: Option<PathBuf>,
    compact: bool,
) -> Result<()> {
    let stack_config = config.stack_config()?;
    let stack = define_stack(&stack_config).context("Failed to define stack")?;
    let template = synthesize(&stack);

    let dangling = template.dangling_references();
    if !dangling.is_empty() {
        bail!("Template references undeclared ids: {}", dangling.join(", "));
    }

    let json = template
        .to_json(!compact)
        .context("Failed to serialize template")?;

    match out {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} {} ({} resources)",
                "✓ Template written to".green().bold(),
                path.display().to_string().cyan(),
                template.resources.len()
            );
        }
        None => println!("{}", json),
    }

    if let Some(path) = parameters_out {
        let values = serde_json::to_string_pretty(&parameter_values(&stack_config))
            .context("Failed to serialize parameters")?;
        std::fs::write(&path, values)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!(
            "{} {}",
            "✓ Parameters written to".green().bold(),
            path.display().to_string().cyan()
        );
    }

    Ok(())
}
