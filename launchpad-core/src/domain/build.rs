//! Build domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::construct::Ref;

pub const DEFAULT_BUILD_IMAGE: &str = "aws/codebuild/standard:7.0";

/// Where the build steps are described
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildSpec {
    /// A file in the source tree, e.g. `buildspec.yml`
    FromSourceFilename(String),
    /// Build steps written directly into the project definition
    Inline(String),
}

impl BuildSpec {
    /// Value of the project's `BuildSpec` property
    pub fn as_property(&self) -> &str {
        match self {
            BuildSpec::FromSourceFilename(name) => name,
            BuildSpec::Inline(body) => body,
        }
    }
}

/// Size of the managed build container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputeType {
    Small,
    Medium,
    Large,
}

impl ComputeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeType::Small => "BUILD_GENERAL1_SMALL",
            ComputeType::Medium => "BUILD_GENERAL1_MEDIUM",
            ComputeType::Large => "BUILD_GENERAL1_LARGE",
        }
    }
}

/// Managed environment the build runs in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEnvironment {
    pub image: String,
    pub compute_type: ComputeType,
}

impl Default for BuildEnvironment {
    fn default() -> Self {
        Self {
            image: DEFAULT_BUILD_IMAGE.to_string(),
            compute_type: ComputeType::Small,
        }
    }
}

/// Build project invoked by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildProject {
    pub project_name: String,
    pub build_spec: BuildSpec,
    pub environment: BuildEnvironment,
}

/// Value of a build environment variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    Plaintext(String),
}

impl EnvValue {
    pub fn as_str(&self) -> &str {
        match self {
            EnvValue::Plaintext(value) => value,
        }
    }

    /// Variable type as the build service names it
    pub fn kind(&self) -> &'static str {
        match self {
            EnvValue::Plaintext(_) => "PLAINTEXT",
        }
    }
}

/// How source is turned into an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDescriptor {
    pub project: Ref<BuildProject>,
    pub env: BTreeMap<String, EnvValue>,
}

impl BuildDescriptor {
    pub fn new(project: Ref<BuildProject>) -> Self {
        Self {
            project,
            env: BTreeMap::new(),
        }
    }

    /// Adds a plaintext environment variable
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), EnvValue::Plaintext(value.into()));
        self
    }
}
