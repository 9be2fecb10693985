//! Build service
//!
//! Turns the source artifact into the build artifact. Build commands belong to
//! the managed build environment, so the local implementation only packages
//! output that already exists in the source tree.

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info};

use launchpad_core::domain::build::{BuildProject, BuildSpec, EnvValue};
use launchpad_core::domain::pipeline::Artifact;

use crate::artifact::ArtifactBundle;

/// Service trait for running a build project
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    /// Builds `input` with `project` and the injected environment
    ///
    /// # Arguments
    /// * `project` - The build project definition
    /// * `input` - The source artifact
    /// * `env` - Variables injected into the build environment
    /// * `output` - Name of the artifact to produce
    async fn build(
        &self,
        project: &BuildProject,
        input: &ArtifactBundle,
        env: &BTreeMap<String, EnvValue>,
        output: &Artifact,
    ) -> Result<ArtifactBundle>;
}

/// Packages a prebuilt output directory from the source tree
pub struct PrebuiltOutputBuild {
    base_directory: String,
}

impl PrebuiltOutputBuild {
    /// # Arguments
    /// * `base_directory` - Directory of the source tree holding build output
    pub fn new(base_directory: impl Into<String>) -> Self {
        Self {
            base_directory: base_directory.into(),
        }
    }
}

#[async_trait]
impl BuildExecutor for PrebuiltOutputBuild {
    async fn build(
        &self,
        project: &BuildProject,
        input: &ArtifactBundle,
        env: &BTreeMap<String, EnvValue>,
        output: &Artifact,
    ) -> Result<ArtifactBundle> {
        if let BuildSpec::FromSourceFilename(name) = &project.build_spec {
            if input.get(name).is_none() {
                bail!(
                    "Build specification {} not found in {}",
                    name,
                    input.artifact
                );
            }
        }

        for (name, value) in env {
            debug!("{}: {}={}", project.project_name, name, value.as_str());
        }

        let files = input.subtree(&self.base_directory);
        if files.is_empty() {
            bail!(
                "{} produced no files under {}",
                project.project_name,
                self.base_directory
            );
        }

        let bundle = ArtifactBundle::new(output.clone(), files);
        info!(
            "{} packaged {} file(s) into {}",
            project.project_name,
            bundle.len(),
            output
        );
        Ok(bundle)
    }
}
