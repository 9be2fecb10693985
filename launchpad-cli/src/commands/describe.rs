//! Describe command
//!
//! Prints what the stack will provision without synthesizing a template.

use anyhow::{Context, Result};
use colored::*;

use launchpad_core::domain::distribution::Distribution;
use launchpad_core::domain::pipeline::{Artifact, Stage};
use launchpad_core::{DeploymentStack, define_stack};

use crate::config::Config;

pub fn describe(config: &Config) -> Result<()> {
    let stack_config = config.stack_config()?;
    let stack = define_stack(&stack_config).context("Failed to define stack")?;

    print_summary(&stack);
    Ok(())
}

fn print_summary(stack: &DeploymentStack) {
    println!("{} {}", "Stack".bold(), stack.name().cyan().bold());
    println!();

    if let Some(source) = stack.source() {
        println!("  Source:     {}@{}", source.full_name().cyan(), source.branch);
        println!("  Trigger:    {:?}", source.trigger);
        println!("  Token:      {}", source.token.to_string().dimmed());
    }

    let project = &stack.build_project.props;
    println!(
        "  Build:      {} ({}, {})",
        project.project_name.cyan(),
        project.build_spec.as_property(),
        project.environment.image.dimmed()
    );
    if let Some(build) = stack.build() {
        for (name, value) in &build.env {
            println!("    {} {}={}", "-".dimmed(), name, value.as_str());
        }
    }

    println!(
        "  Bucket:     {} (removal: {:?})",
        stack.bucket.handle.path().to_string().cyan(),
        stack.bucket.props.removal_policy
    );
    for statement in &stack.bucket_policy.props.statements {
        println!(
            "    {} {:?} {} for {}",
            "-".dimmed(),
            statement.effect,
            statement.actions.join(", "),
            statement
                .identities()
                .map(|identity| identity.path().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    println!();
    println!("{}", "Pipeline".bold());
    for (index, stage) in stack.pipeline.props.stages.iter().enumerate() {
        print_stage(index + 1, stage);
    }

    println!();
    println!("{}", "Distribution".bold());
    print_distribution(&stack.distribution.props);
}

fn print_stage(position: usize, stage: &Stage) {
    println!("  {} {}. {}", "▸".cyan(), position, stage.name.bold());
    for action in &stage.actions {
        let inputs = names(action.inputs());
        let outputs = names(action.outputs());
        println!(
            "    {} [{}]  in: {}  out: {}",
            action.name(),
            action.category(),
            inputs.dimmed(),
            outputs.dimmed()
        );
    }
}

fn print_distribution(distribution: &Distribution) {
    println!("  Root object: {}", distribution.default_root_object.cyan());
    println!("  Price class: {}", distribution.price_class.as_str());

    for origin in &distribution.origins {
        println!(
            "  Origin:      {} via {}",
            origin.bucket.path(),
            origin.identity.path()
        );
        for behavior in &origin.behaviors {
            println!(
                "    {} {:<10} ttl {} / {} / {}  methods {}",
                "-".dimmed(),
                behavior.path_pattern,
                behavior.min_ttl,
                behavior.default_ttl,
                behavior.max_ttl,
                behavior.allowed_methods.methods().join(",")
            );
        }
    }

    for rewrite in &distribution.error_responses {
        println!(
            "  On {}:      {} {} (cached {})",
            rewrite.error_code.to_string().yellow(),
            rewrite.response_code.to_string().green(),
            rewrite.response_page_path,
            rewrite.error_caching_min_ttl
        );
    }
}

fn names(artifacts: Vec<&Artifact>) -> String {
    if artifacts.is_empty() {
        return "-".to_string();
    }
    artifacts
        .iter()
        .map(|a| a.name())
        .collect::<Vec<_>>()
        .join(", ")
}
