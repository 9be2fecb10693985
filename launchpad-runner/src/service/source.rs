//! Source service
//!
//! Produces the source artifact: a snapshot of the watched branch. The local
//! implementation reads a working tree from disk and checks the descriptor the
//! way the source host would, so empty credentials fail here and not earlier.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use launchpad_core::domain::pipeline::Artifact;
use launchpad_core::domain::source::SourceDescriptor;

use crate::artifact::{ArtifactBundle, content_revision};

const SKIPPED_DIRECTORIES: &[&str] = &[".git"];

/// Errors the source host reports
#[derive(Debug, Error)]
pub enum SourceError {
    /// The token was rejected
    #[error("Source host rejected the credentials for {0}")]
    Unauthorized(String),

    /// The repository or branch does not exist
    #[error("Repository {0} not found")]
    RepositoryNotFound(String),

    /// The snapshot could not be read
    #[error("Failed to read source tree: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking read task did not complete
    #[error("Source task failed: {0}")]
    Task(String),
}

/// Service trait for fetching source snapshots
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Revision at the head of the watched branch
    async fn latest_revision(&self, source: &SourceDescriptor) -> Result<String, SourceError>;

    /// Snapshot of the watched branch, packaged as `output`
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        output: &Artifact,
    ) -> Result<ArtifactBundle, SourceError>;
}

/// Reads the branch from a local working tree
pub struct LocalDirectorySource {
    root: PathBuf,
}

impl LocalDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn authorize(&self, source: &SourceDescriptor) -> Result<(), SourceError> {
        if source.token.is_blank() {
            return Err(SourceError::Unauthorized(source.full_name()));
        }
        if source.owner.trim().is_empty() || source.repo.trim().is_empty() {
            return Err(SourceError::RepositoryNotFound(source.full_name()));
        }
        if !self.root.is_dir() {
            return Err(SourceError::RepositoryNotFound(format!(
                "{} at {}",
                source.full_name(),
                self.root.display()
            )));
        }
        Ok(())
    }

    async fn read(&self) -> Result<BTreeMap<String, Vec<u8>>, SourceError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || read_tree(&root))
            .await
            .map_err(|e| SourceError::Task(e.to_string()))?
    }
}

#[async_trait]
impl SourceProvider for LocalDirectorySource {
    async fn latest_revision(&self, source: &SourceDescriptor) -> Result<String, SourceError> {
        self.authorize(source)?;
        let files = self.read().await?;
        Ok(content_revision(&files))
    }

    async fn fetch(
        &self,
        source: &SourceDescriptor,
        output: &Artifact,
    ) -> Result<ArtifactBundle, SourceError> {
        self.authorize(source)?;
        let files = self.read().await?;
        let bundle = ArtifactBundle::new(output.clone(), files);

        info!(
            "Fetched {}@{} ({} files, revision {})",
            source.full_name(),
            source.branch,
            bundle.len(),
            &bundle.revision[..12]
        );
        Ok(bundle)
    }
}

/// Reads every regular file below `root`, keyed by `/`-separated relative path
fn read_tree(root: &Path) -> Result<BTreeMap<String, Vec<u8>>, SourceError> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                let name = entry.file_name();
                if SKIPPED_DIRECTORIES.iter().any(|skip| name == *skip) {
                    continue;
                }
                pending.push(path);
            } else if file_type.is_file() {
                let relative = path
                    .strip_prefix(root)
                    .map_err(|e| SourceError::Task(e.to_string()))?;
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                debug!("Read {}", key);
                files.insert(key, std::fs::read(&path)?);
            }
        }
    }

    Ok(files)
}

/// Tracks the last revision seen and reports when the branch moves
pub struct SourcePoller<'a> {
    provider: &'a dyn SourceProvider,
    last_seen: Option<String>,
}

impl<'a> SourcePoller<'a> {
    pub fn new(provider: &'a dyn SourceProvider) -> Self {
        Self {
            provider,
            last_seen: None,
        }
    }

    /// Starts from a known revision instead of treating the first poll as new
    pub fn starting_at(mut self, revision: impl Into<String>) -> Self {
        self.last_seen = Some(revision.into());
        self
    }

    /// Returns the new head revision when it differs from the last one seen
    pub async fn poll(&mut self, source: &SourceDescriptor) -> Result<Option<String>, SourceError> {
        let revision = self.provider.latest_revision(source).await?;

        if self.last_seen.as_deref() == Some(revision.as_str()) {
            debug!("No new commits on {}@{}", source.full_name(), source.branch);
            return Ok(None);
        }

        info!("New revision on {}@{}: {}", source.full_name(), source.branch, revision);
        self.last_seen = Some(revision.clone());
        Ok(Some(revision))
    }
}
