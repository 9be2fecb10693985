//! Resource rendering
//!
//! One function per resource kind. Each takes the typed configuration record
//! and renders the template resource for it.

use serde_json::{Value as JsonValue, json};

use super::Resource;
use super::intrinsics::{get_att, join, reference};
use crate::construct::ConstructPath;
use crate::domain::build::{BuildDescriptor, BuildProject};
use crate::domain::distribution::{
    Behavior, Distribution, ErrorResponse, S3Origin, ViewerCertificate,
};
use crate::domain::pipeline::{Action, Artifact, Pipeline};
use crate::domain::source::SourceTrigger;
use crate::domain::storage::{
    Bucket, BucketPolicy, Effect, OriginAccessIdentity, PolicyResource, PolicyStatement, Principal,
};

const POLICY_VERSION: &str = "2012-10-17";
const OAI_PREFIX: &str = "origin-access-identity/cloudfront/";

/// Parameter holding the source token
pub const TOKEN_PARAMETER: &str = "SourceOAuthToken";

pub fn site_bucket(bucket: &Bucket) -> Resource {
    let policy = bucket.removal_policy.deletion_policy();
    Resource::new(
        "AWS::S3::Bucket",
        json!({ "PublicAccessBlockConfiguration": block_public_access() }),
    )
    .with_deletion_policy(policy)
}

pub fn artifacts_bucket() -> Resource {
    Resource::new(
        "AWS::S3::Bucket",
        json!({
            "PublicAccessBlockConfiguration": block_public_access(),
            "BucketEncryption": {
                "ServerSideEncryptionConfiguration": [
                    { "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" } }
                ]
            }
        }),
    )
    .with_deletion_policy("Retain")
}

fn block_public_access() -> JsonValue {
    json!({
        "BlockPublicAcls": true,
        "BlockPublicPolicy": true,
        "IgnorePublicAcls": true,
        "RestrictPublicBuckets": true
    })
}

pub fn origin_access_identity(identity: &OriginAccessIdentity) -> Resource {
    Resource::new(
        "AWS::CloudFront::CloudFrontOriginAccessIdentity",
        json!({
            "CloudFrontOriginAccessIdentityConfig": { "Comment": identity.comment }
        }),
    )
}

pub fn bucket_policy(policy: &BucketPolicy) -> Resource {
    let statements: Vec<JsonValue> = policy.statements.iter().map(policy_statement).collect();
    Resource::new(
        "AWS::S3::BucketPolicy",
        json!({
            "Bucket": reference(&policy.bucket.logical_id()),
            "PolicyDocument": { "Version": POLICY_VERSION, "Statement": statements }
        }),
    )
}

fn policy_statement(statement: &PolicyStatement) -> JsonValue {
    let effect = match statement.effect {
        Effect::Allow => "Allow",
        Effect::Deny => "Deny",
    };

    let principal = if statement.principals.contains(&Principal::Anyone) {
        json!("*")
    } else {
        let users: Vec<JsonValue> = statement
            .identities()
            .map(|identity| get_att(&identity.logical_id(), "S3CanonicalUserId"))
            .collect();
        json!({ "CanonicalUser": single_or_list(users) })
    };

    let resources: Vec<JsonValue> = statement
        .resources
        .iter()
        .map(|resource| match resource {
            PolicyResource::AllObjects(bucket) => {
                join(vec![get_att(&bucket.logical_id(), "Arn"), json!("/*")])
            }
            PolicyResource::Bucket(bucket) => get_att(&bucket.logical_id(), "Arn"),
        })
        .collect();

    let actions: Vec<JsonValue> = statement.actions.iter().map(|a| json!(a)).collect();

    json!({
        "Effect": effect,
        "Action": single_or_list(actions),
        "Principal": principal,
        "Resource": single_or_list(resources),
    })
}

fn single_or_list(mut values: Vec<JsonValue>) -> JsonValue {
    if values.len() == 1 {
        values.remove(0)
    } else {
        JsonValue::Array(values)
    }
}

fn assume_role_policy(service: &str) -> JsonValue {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Action": "sts:AssumeRole",
            "Principal": { "Service": service }
        }]
    })
}

/// Role the build service assumes while running the project
pub fn build_role(artifacts_bucket: &ConstructPath) -> Resource {
    let artifacts = artifacts_bucket.logical_id();
    Resource::new(
        "AWS::IAM::Role",
        json!({
            "AssumeRolePolicyDocument": assume_role_policy("codebuild.amazonaws.com"),
            "Policies": [{
                "PolicyName": "BuildProjectAccess",
                "PolicyDocument": {
                    "Version": POLICY_VERSION,
                    "Statement": [
                        {
                            "Effect": "Allow",
                            "Action": [
                                "logs:CreateLogGroup",
                                "logs:CreateLogStream",
                                "logs:PutLogEvents"
                            ],
                            "Resource": "*"
                        },
                        {
                            "Effect": "Allow",
                            "Action": ["s3:GetObject", "s3:GetObjectVersion", "s3:PutObject"],
                            "Resource": join(vec![get_att(&artifacts, "Arn"), json!("/*")])
                        }
                    ]
                }
            }]
        }),
    )
}

/// Role the pipeline engine assumes while running stages
pub fn pipeline_role(
    artifacts_bucket: &ConstructPath,
    deploy_buckets: &[String],
    projects: &[String],
) -> Resource {
    let artifacts = artifacts_bucket.logical_id();

    let mut bucket_resources = vec![
        get_att(&artifacts, "Arn"),
        join(vec![get_att(&artifacts, "Arn"), json!("/*")]),
    ];
    for bucket in deploy_buckets {
        bucket_resources.push(get_att(bucket, "Arn"));
        bucket_resources.push(join(vec![get_att(bucket, "Arn"), json!("/*")]));
    }

    let project_resources: Vec<JsonValue> =
        projects.iter().map(|project| get_att(project, "Arn")).collect();

    Resource::new(
        "AWS::IAM::Role",
        json!({
            "AssumeRolePolicyDocument": assume_role_policy("codepipeline.amazonaws.com"),
            "Policies": [{
                "PolicyName": "PipelineAccess",
                "PolicyDocument": {
                    "Version": POLICY_VERSION,
                    "Statement": [
                        {
                            "Effect": "Allow",
                            "Action": [
                                "s3:GetObject", "s3:GetObjectVersion", "s3:GetBucketVersioning",
                                "s3:PutObject", "s3:PutObjectAcl", "s3:ListBucket"
                            ],
                            "Resource": bucket_resources
                        },
                        {
                            "Effect": "Allow",
                            "Action": ["codebuild:BatchGetBuilds", "codebuild:StartBuild"],
                            "Resource": project_resources
                        }
                    ]
                }
            }]
        }),
    )
}

pub fn build_project(project: &BuildProject, role: &ConstructPath) -> Resource {
    Resource::new(
        "AWS::CodeBuild::Project",
        json!({
            "Name": project.project_name,
            "ServiceRole": get_att(&role.logical_id(), "Arn"),
            "Source": { "Type": "CODEPIPELINE", "BuildSpec": project.build_spec.as_property() },
            "Artifacts": { "Type": "CODEPIPELINE" },
            "Environment": {
                "Type": "LINUX_CONTAINER",
                "Image": project.environment.image,
                "ComputeType": project.environment.compute_type.as_str(),
                "PrivilegedMode": false
            }
        }),
    )
}

pub fn pipeline(
    pipeline: &Pipeline,
    role: &ConstructPath,
    artifacts_bucket: &ConstructPath,
) -> Resource {
    let stages: Vec<JsonValue> = pipeline
        .stages
        .iter()
        .map(|stage| {
            let actions: Vec<JsonValue> = stage.actions.iter().map(action).collect();
            json!({ "Name": stage.name, "Actions": actions })
        })
        .collect();

    Resource::new(
        "AWS::CodePipeline::Pipeline",
        json!({
            "Name": pipeline.pipeline_name,
            "RoleArn": get_att(&role.logical_id(), "Arn"),
            "RestartExecutionOnUpdate": pipeline.restart_execution_on_update,
            "ArtifactStore": {
                "Type": "S3",
                "Location": reference(&artifacts_bucket.logical_id())
            },
            "Stages": stages
        }),
    )
    .depends_on(role.logical_id())
}

fn artifact_list(artifacts: &[&Artifact]) -> JsonValue {
    let names: Vec<JsonValue> = artifacts
        .iter()
        .map(|artifact| json!({ "Name": artifact.name() }))
        .collect();
    JsonValue::Array(names)
}

fn action(action: &Action) -> JsonValue {
    let (owner, provider, configuration) = match action {
        Action::GitHubSource { source, .. } => (
            "ThirdParty",
            "GitHub",
            json!({
                "Owner": source.owner,
                "Repo": source.repo,
                "Branch": source.branch,
                "OAuthToken": reference(TOKEN_PARAMETER),
                "PollForSourceChanges": source.trigger == SourceTrigger::Poll
            }),
        ),
        Action::CodeBuild { build, .. } => ("AWS", "CodeBuild", build_configuration(build)),
        Action::S3Deploy { bucket, extract, .. } => (
            "AWS",
            "S3",
            json!({
                "BucketName": reference(&bucket.logical_id()),
                "Extract": extract.to_string()
            }),
        ),
    };

    let mut rendered = json!({
        "Name": action.name(),
        "ActionTypeId": {
            "Category": action.category().to_string(),
            "Owner": owner,
            "Provider": provider,
            "Version": "1"
        },
        "Configuration": configuration,
        "RunOrder": 1
    });

    let inputs = action.inputs();
    if !inputs.is_empty() {
        rendered["InputArtifacts"] = artifact_list(&inputs);
    }
    let outputs = action.outputs();
    if !outputs.is_empty() {
        rendered["OutputArtifacts"] = artifact_list(&outputs);
    }

    rendered
}

fn build_configuration(build: &BuildDescriptor) -> JsonValue {
    let mut configuration = json!({ "ProjectName": reference(&build.project.logical_id()) });

    if !build.env.is_empty() {
        let variables: Vec<JsonValue> = build
            .env
            .iter()
            .map(|(name, value)| {
                json!({ "name": name, "type": value.kind(), "value": value.as_str() })
            })
            .collect();
        // The pipeline engine expects the variable list as a JSON string.
        configuration["EnvironmentVariables"] = json!(JsonValue::Array(variables).to_string());
    }

    configuration
}

pub fn distribution(distribution: &Distribution) -> Resource {
    let origins: Vec<JsonValue> = distribution
        .origins
        .iter()
        .enumerate()
        .map(|(index, origin)| s3_origin(index, origin))
        .collect();

    let mut default_behavior = JsonValue::Null;
    let mut cache_behaviors = Vec::new();
    for (index, origin) in distribution.origins.iter().enumerate() {
        for behavior in &origin.behaviors {
            let rendered = cache_behavior(&origin_id(index), behavior);
            if behavior.is_default {
                default_behavior = rendered;
            } else {
                cache_behaviors.push(rendered);
            }
        }
    }

    let error_responses: Vec<JsonValue> =
        distribution.error_responses.iter().map(error_response).collect();

    let viewer_certificate = match distribution.viewer_certificate {
        ViewerCertificate::CloudFrontDefault => json!({ "CloudFrontDefaultCertificate": true }),
    };

    let mut config = json!({
        "Enabled": true,
        "HttpVersion": "http2",
        "IPV6Enabled": true,
        "DefaultRootObject": distribution.default_root_object,
        "PriceClass": distribution.price_class.as_str(),
        "Origins": origins,
        "DefaultCacheBehavior": default_behavior,
        "CustomErrorResponses": error_responses,
        "ViewerCertificate": viewer_certificate
    });
    if !cache_behaviors.is_empty() {
        config["CacheBehaviors"] = JsonValue::Array(cache_behaviors);
    }
    if !distribution.aliases.is_empty() {
        config["Aliases"] = json!(distribution.aliases);
    }

    Resource::new(
        "AWS::CloudFront::Distribution",
        json!({ "DistributionConfig": config }),
    )
}

fn origin_id(index: usize) -> String {
    format!("origin{}", index + 1)
}

fn s3_origin(index: usize, origin: &S3Origin) -> JsonValue {
    json!({
        "Id": origin_id(index),
        "DomainName": get_att(&origin.bucket.logical_id(), "RegionalDomainName"),
        "S3OriginConfig": {
            "OriginAccessIdentity": join(vec![
                json!(OAI_PREFIX),
                reference(&origin.identity.logical_id()),
            ])
        }
    })
}

fn cache_behavior(origin_id: &str, behavior: &Behavior) -> JsonValue {
    let methods = behavior.allowed_methods.methods();
    let mut rendered = json!({
        "TargetOriginId": origin_id,
        "ViewerProtocolPolicy": "redirect-to-https",
        "AllowedMethods": methods,
        "CachedMethods": ["GET", "HEAD"],
        "Compress": behavior.compress,
        "MinTTL": behavior.min_ttl.as_secs(),
        "DefaultTTL": behavior.default_ttl.as_secs(),
        "MaxTTL": behavior.max_ttl.as_secs(),
        "ForwardedValues": { "QueryString": false, "Cookies": { "Forward": "none" } }
    });
    if !behavior.is_default {
        rendered["PathPattern"] = json!(behavior.path_pattern);
    }
    rendered
}

fn error_response(response: &ErrorResponse) -> JsonValue {
    json!({
        "ErrorCode": response.error_code,
        "ResponseCode": response.response_code,
        "ResponsePagePath": response.response_page_path,
        "ErrorCachingMinTTL": response.error_caching_min_ttl.as_secs()
    })
}
