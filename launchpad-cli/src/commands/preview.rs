//! Preview command
//!
//! Plays the pipeline against a local working tree, deploys into an in-memory
//! bucket and requests paths through the edge preview. With `--since`, the run
//! only happens when the working tree has moved past that revision.

use anyhow::{Context, Result, bail};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;

use launchpad_core::define_stack;
use launchpad_core::domain::run::{LogLevel, RunRecord, StageStatus};
use launchpad_runner::service::{LocalDirectorySource, PrebuiltOutputBuild};
use launchpad_runner::{EdgePreview, EdgeResponse, InMemoryObjectStore, PipelineExecutor};

use crate::config::Config;

pub async fn preview(
    config: &Config,
    source_dir: PathBuf,
    build_dir: String,
    paths: Vec<String>,
    since: Option<String>,
) -> Result<()> {
    let stack_config = config.stack_config()?;
    let stack = define_stack(&stack_config).context("Failed to define stack")?;

    let store = Arc::new(InMemoryObjectStore::new());
    let executor = PipelineExecutor::new(
        Arc::new(LocalDirectorySource::new(source_dir)),
        Arc::new(PrebuiltOutputBuild::new(build_dir)),
    )
    .with_bucket(&stack.bucket.handle, store.clone());

    let record = match since {
        Some(since) => {
            let Some(record) = executor
                .run_if_changed(&stack, &since)
                .await
                .context("Failed to poll source")?
            else {
                println!("{} still at {}, nothing to deploy", "Source".bold(), since.dimmed());
                return Ok(());
            };
            record
        }
        None => executor.run(&stack).await,
    };
    print_run(&record);

    if !record.succeeded() {
        bail!("Pipeline run {} failed", record.id);
    }

    println!();
    println!("{}", "Edge".bold());
    let edge = EdgePreview::for_stack(&stack, store);
    let now = chrono::Utc::now();
    for path in &paths {
        let response = edge
            .request(path, now)
            .await
            .with_context(|| format!("Failed to request {}", path))?;
        print_response(path, &response);
    }

    Ok(())
}

fn print_run(record: &RunRecord) {
    println!(
        "{} {} ({})",
        "Run".bold(),
        record.id.to_string().cyan(),
        record.pipeline_name
    );
    if let Some(revision) = &record.source_revision {
        println!("  Revision: {}", revision.dimmed());
    }

    for stage in &record.stages {
        let status = match stage.status {
            StageStatus::Succeeded => stage.status.to_string().green(),
            StageStatus::Failed => stage.status.to_string().red(),
            StageStatus::Skipped => stage.status.to_string().dimmed(),
        };
        println!("  {} {:<8} {}", "▸".cyan(), stage.name, status);
        if let Some(message) = &stage.error_message {
            println!("      {}", message.red());
        }
    }

    println!();
    for entry in &record.logs {
        let level = match entry.level {
            LogLevel::Debug => "DEBUG".dimmed(),
            LogLevel::Info => "INFO ".normal(),
            LogLevel::Warning => "WARN ".yellow(),
            LogLevel::Error => "ERROR".red(),
        };
        println!(
            "  {} {} {}",
            entry.timestamp.format("%H:%M:%S").to_string().dimmed(),
            level,
            entry.message
        );
    }
}

fn print_response(path: &str, response: &EdgeResponse) {
    let status = if response.status < 400 {
        response.status.to_string().green()
    } else {
        response.status.to_string().red()
    };

    let mut notes = Vec::new();
    if let Some(key) = &response.served_key {
        notes.push(key.clone());
    }
    if let Some(original) = response.rewritten_from {
        notes.push(format!("rewritten from {}", original));
    }
    if response.from_cache {
        notes.push("cached".to_string());
    }

    println!(
        "  {} {:<24} {} {} bytes  {}",
        "▸".cyan(),
        path,
        status,
        response.body.len(),
        notes.join(", ").dimmed()
    );
}
