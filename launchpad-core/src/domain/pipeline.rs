//! Pipeline domain types
//!
//! A pipeline is an ordered list of stages; each stage holds actions that
//! consume and produce named artifacts. Artifact names are the only binding
//! between stages.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::construct::Ref;
use crate::domain::build::BuildDescriptor;
use crate::domain::source::SourceDescriptor;
use crate::domain::storage::Bucket;

pub const STAGE_SOURCE: &str = "Source";
pub const STAGE_BUILD: &str = "Build";
pub const STAGE_DEPLOY: &str = "Deploy";

/// Stage order every deployment pipeline must follow
pub const STAGE_ORDER: [&str; 3] = [STAGE_SOURCE, STAGE_BUILD, STAGE_DEPLOY];

/// A named, versioned bundle of files passed between stages
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Artifact {
    name: String,
}

impl Artifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Artifact produced by `action` in `stage`
    pub fn output_of(stage: &str, action: &str) -> Self {
        Self::new(format!("Artifact_{}_{}", stage, action))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Kind of work an action performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionCategory {
    Source,
    Build,
    Deploy,
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionCategory::Source => write!(f, "Source"),
            ActionCategory::Build => write!(f, "Build"),
            ActionCategory::Deploy => write!(f, "Deploy"),
        }
    }
}

/// A single step inside a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Snapshot a branch of a hosted repository
    GitHubSource {
        name: String,
        source: SourceDescriptor,
        output: Artifact,
    },
    /// Run a build project against an input artifact
    CodeBuild {
        name: String,
        build: BuildDescriptor,
        input: Artifact,
        outputs: Vec<Artifact>,
    },
    /// Upload an artifact's contents into a bucket
    S3Deploy {
        name: String,
        bucket: Ref<Bucket>,
        input: Artifact,
        extract: bool,
    },
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::GitHubSource { name, .. }
            | Action::CodeBuild { name, .. }
            | Action::S3Deploy { name, .. } => name,
        }
    }

    pub fn category(&self) -> ActionCategory {
        match self {
            Action::GitHubSource { .. } => ActionCategory::Source,
            Action::CodeBuild { .. } => ActionCategory::Build,
            Action::S3Deploy { .. } => ActionCategory::Deploy,
        }
    }

    pub fn inputs(&self) -> Vec<&Artifact> {
        match self {
            Action::GitHubSource { .. } => Vec::new(),
            Action::CodeBuild { input, .. } | Action::S3Deploy { input, .. } => vec![input],
        }
    }

    pub fn outputs(&self) -> Vec<&Artifact> {
        match self {
            Action::GitHubSource { output, .. } => vec![output],
            Action::CodeBuild { outputs, .. } => outputs.iter().collect(),
            Action::S3Deploy { .. } => Vec::new(),
        }
    }
}

/// A named group of actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub actions: Vec<Action>,
}

impl Stage {
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            actions,
        }
    }

    /// Artifacts consumed by any action of this stage
    pub fn inputs(&self) -> Vec<&Artifact> {
        self.actions.iter().flat_map(Action::inputs).collect()
    }

    /// Artifacts produced by any action of this stage
    pub fn outputs(&self) -> Vec<&Artifact> {
        self.actions.iter().flat_map(Action::outputs).collect()
    }
}

/// Ordered stages executed by the managed pipeline engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub pipeline_name: String,
    pub stages: Vec<Stage>,
    pub restart_execution_on_update: bool,
}

impl Pipeline {
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_action() -> Action {
        Action::GitHubSource {
            name: "GitHubAction".to_string(),
            source: SourceDescriptor::new("acme", "site", "main", "t"),
            output: Artifact::output_of(STAGE_SOURCE, "GitHubAction"),
        }
    }

    #[test]
    fn test_artifact_naming() {
        let artifact = Artifact::output_of("Build", "BuildAction");
        assert_eq!(artifact.name(), "Artifact_Build_BuildAction");
        assert_eq!(artifact.to_string(), "Artifact_Build_BuildAction");
    }

    #[test]
    fn test_source_action_has_only_outputs() {
        let action = source_action();
        assert_eq!(action.category(), ActionCategory::Source);
        assert!(action.inputs().is_empty());
        assert_eq!(action.outputs().len(), 1);

        let stage = Stage::new(STAGE_SOURCE, vec![action]);
        assert_eq!(stage.outputs()[0].name(), "Artifact_Source_GitHubAction");
    }
}
