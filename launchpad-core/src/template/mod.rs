//! Template synthesis
//!
//! Renders a [`DeploymentStack`] into a CloudFormation template, the document
//! the provisioning engine consumes. Resource keys are the constructs' logical
//! ids, so a re-synthesized stack keeps the same keys.
//!
//! The source token is never written into the template. It is declared as a
//! `NoEcho` parameter and its value is produced separately by
//! [`parameter_values`].

mod intrinsics;
mod resources;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::config::StackConfig;
use crate::domain::pipeline::Action;
use crate::stack::DeploymentStack;

pub use intrinsics::referenced_ids;
pub use resources::TOKEN_PARAMETER;

pub const FORMAT_VERSION: &str = "2010-09-09";

/// A template parameter declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_echo: bool,
    pub description: String,
}

/// A single template resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub kind: String,
    pub properties: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new(kind: impl Into<String>, properties: JsonValue) -> Self {
        Self {
            kind: kind.into(),
            properties,
            deletion_policy: None,
            update_replace_policy: None,
            depends_on: Vec::new(),
        }
    }

    /// Sets both the deletion and the update-replace policy
    pub fn with_deletion_policy(mut self, policy: &str) -> Self {
        self.deletion_policy = Some(policy.to_string());
        self.update_replace_policy = Some(policy.to_string());
        self
    }

    pub fn depends_on(mut self, logical_id: String) -> Self {
        self.depends_on.push(logical_id);
        self
    }
}

/// A template output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub description: String,
    pub value: JsonValue,
}

/// Value supplied for a parameter at deploy time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterValue {
    pub parameter_key: String,
    pub parameter_value: String,
}

/// A synthesized CloudFormation template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    pub description: String,
    pub parameters: BTreeMap<String, Parameter>,
    pub resources: BTreeMap<String, Resource>,
    pub outputs: BTreeMap<String, Output>,
}

impl Template {
    /// Resources of the given type, keyed by logical id
    pub fn resources_of_type<'a>(
        &'a self,
        kind: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Resource)> + 'a {
        self.resources.iter().filter(move |(_, r)| r.kind == kind)
    }

    /// Every `Ref`/`Fn::GetAtt` target that is neither a resource nor a parameter
    pub fn dangling_references(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .resources
            .values()
            .map(|r| &r.properties)
            .chain(self.outputs.values().map(|o| &o.value))
            .flat_map(referenced_ids)
            .filter(|id| !self.resources.contains_key(id) && !self.parameters.contains_key(id))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

/// Renders `stack` into a template
pub fn synthesize(stack: &DeploymentStack) -> Template {
    let mut resources = BTreeMap::new();

    let pipeline_path = stack.pipeline.handle.path();
    let artifacts_path = pipeline_path.child("ArtifactsBucket");
    let pipeline_role_path = pipeline_path.child("Role");
    let build_role_path = stack.build_project.handle.path().child("Role");

    let deploy_buckets: Vec<String> = stack
        .pipeline
        .props
        .stages
        .iter()
        .flat_map(|s| s.actions.iter())
        .filter_map(|action| match action {
            Action::S3Deploy { bucket, .. } => Some(bucket.logical_id()),
            _ => None,
        })
        .collect();
    let projects = vec![stack.build_project.handle.logical_id()];

    resources.insert(
        stack.bucket.handle.logical_id(),
        resources::site_bucket(&stack.bucket.props),
    );
    resources.insert(
        stack.bucket_policy.handle.logical_id(),
        resources::bucket_policy(&stack.bucket_policy.props),
    );
    resources.insert(
        stack.identity.handle.logical_id(),
        resources::origin_access_identity(&stack.identity.props),
    );
    resources.insert(artifacts_path.logical_id(), resources::artifacts_bucket());
    resources.insert(
        build_role_path.logical_id(),
        resources::build_role(&artifacts_path),
    );
    resources.insert(
        stack.build_project.handle.logical_id(),
        resources::build_project(&stack.build_project.props, &build_role_path),
    );
    resources.insert(
        pipeline_role_path.logical_id(),
        resources::pipeline_role(&artifacts_path, &deploy_buckets, &projects),
    );
    resources.insert(
        stack.pipeline.handle.logical_id(),
        resources::pipeline(&stack.pipeline.props, &pipeline_role_path, &artifacts_path),
    );
    resources.insert(
        stack.distribution.handle.logical_id(),
        resources::distribution(&stack.distribution.props),
    );

    let mut parameters = BTreeMap::new();
    parameters.insert(
        TOKEN_PARAMETER.to_string(),
        Parameter {
            kind: "String".to_string(),
            no_echo: true,
            description: "Token the source stage uses to read the repository".to_string(),
        },
    );

    let mut outputs = BTreeMap::new();
    outputs.insert(
        "SiteBucketName".to_string(),
        Output {
            description: "Bucket the deploy stage writes to".to_string(),
            value: intrinsics::reference(&stack.bucket.handle.logical_id()),
        },
    );
    outputs.insert(
        "DistributionDomainName".to_string(),
        Output {
            description: "Domain serving the site".to_string(),
            value: intrinsics::get_att(&stack.distribution.handle.logical_id(), "DomainName"),
        },
    );
    outputs.insert(
        "PipelineName".to_string(),
        Output {
            description: "Pipeline that builds and deploys the site".to_string(),
            value: intrinsics::reference(&stack.pipeline.handle.logical_id()),
        },
    );

    tracing::info!(
        "Synthesized {} resource(s) for stack {}",
        resources.len(),
        stack.name()
    );

    Template {
        format_version: FORMAT_VERSION.to_string(),
        description: format!("Build and deploy pipeline for {}", stack.name()),
        parameters,
        resources,
        outputs,
    }
}

/// Parameter values to pass to the provisioning engine alongside the template
pub fn parameter_values(config: &StackConfig) -> Vec<ParameterValue> {
    vec![ParameterValue {
        parameter_key: TOKEN_PARAMETER.to_string(),
        parameter_value: config.source.token.expose().to_string(),
    }]
}
