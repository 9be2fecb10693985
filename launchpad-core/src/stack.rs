//! Stack definition
//!
//! Assembles the whole deployment graph from a [`StackConfig`]:
//!
//! ```text
//! Source (poll branch) -> Build (build spec + env) -> Deploy (extract into bucket)
//!                                                          |
//!                          Distribution <- access identity +
//! ```
//!
//! The result is immutable configuration; nothing here talks to a provider.

use tracing::{debug, info};

use crate::config::StackConfig;
use crate::construct::{Ref, Stack};
use crate::domain::build::{BuildDescriptor, BuildEnvironment, BuildProject, BuildSpec};
use crate::domain::distribution::{
    Behavior, Distribution, ErrorResponse, PriceClass, S3Origin, ViewerCertificate,
};
use crate::domain::pipeline::{
    Action, Artifact, Pipeline, STAGE_BUILD, STAGE_DEPLOY, STAGE_SOURCE, Stage,
};
use crate::domain::source::SourceDescriptor;
use crate::domain::storage::{
    Bucket, BucketPolicy, OriginAccessIdentity, PolicyStatement, RemovalPolicy,
};
use crate::error::DefinitionError;
use crate::validate;

pub const BUILD_PROJECT_ID: &str = "BuildProject";
pub const SITE_BUCKET_ID: &str = "SiteBucket";
pub const IDENTITY_ID: &str = "OriginAccessIdentity";
pub const PIPELINE_ID: &str = "Pipeline";
pub const DISTRIBUTION_ID: &str = "WebsiteDistribution";

pub const SOURCE_ACTION_NAME: &str = "GitHubAction";
pub const BUILD_ACTION_NAME: &str = "BuildAction";
pub const DEPLOY_ACTION_NAME: &str = "DeployAction";

/// Origin statuses rewritten to the entry document
pub const FALLBACK_STATUSES: [u16; 2] = [403, 404];

/// A resource together with the ref other resources use to point at it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declared<T> {
    pub handle: Ref<T>,
    pub props: T,
}

impl<T> Declared<T> {
    fn new(handle: Ref<T>, props: T) -> Self {
        Self { handle, props }
    }
}

/// The fully assembled deployment stack
#[derive(Debug, Clone)]
pub struct DeploymentStack {
    pub construct: Stack,
    pub build_project: Declared<BuildProject>,
    pub bucket: Declared<Bucket>,
    pub identity: Declared<OriginAccessIdentity>,
    pub bucket_policy: Declared<BucketPolicy>,
    pub pipeline: Declared<Pipeline>,
    pub distribution: Declared<Distribution>,
}

impl DeploymentStack {
    pub fn name(&self) -> &str {
        self.construct.id()
    }

    /// Repository watched by the source stage
    pub fn source(&self) -> Option<&SourceDescriptor> {
        self.actions().find_map(|action| match action {
            Action::GitHubSource { source, .. } => Some(source),
            _ => None,
        })
    }

    /// Build settings used by the build stage
    pub fn build(&self) -> Option<&BuildDescriptor> {
        self.actions().find_map(|action| match action {
            Action::CodeBuild { build, .. } => Some(build),
            _ => None,
        })
    }

    fn actions(&self) -> impl Iterator<Item = &Action> {
        self.pipeline.props.stages.iter().flat_map(|s| s.actions.iter())
    }
}

/// Defines the deployment stack described by `config`
///
/// # Errors
/// Returns an error if the configuration is rejected (e.g. a blank token),
/// a construct id collides, or the assembled graph breaks an invariant.
pub fn define_stack(config: &StackConfig) -> Result<DeploymentStack, DefinitionError> {
    config.validate()?;

    let mut stack = Stack::new(config.stack_name.as_str())?;
    info!("Defining stack {}", stack.id());

    // Source
    let source_output = Artifact::output_of(STAGE_SOURCE, SOURCE_ACTION_NAME);
    let source_action = Action::GitHubSource {
        name: SOURCE_ACTION_NAME.to_string(),
        source: SourceDescriptor::new(
            config.source.owner.clone(),
            config.source.repo.clone(),
            config.source.branch.clone(),
            config.source.token.clone(),
        ),
        output: source_output.clone(),
    };
    debug!(
        "Source: {}/{}@{}",
        config.source.owner, config.source.repo, config.source.branch
    );

    // Build
    let project_ref = stack.register::<BuildProject>(BUILD_PROJECT_ID)?;
    let project = BuildProject {
        project_name: BUILD_PROJECT_ID.to_string(),
        build_spec: BuildSpec::FromSourceFilename(config.build.spec_file.clone()),
        environment: BuildEnvironment::default(),
    };

    let build = config
        .build
        .env
        .iter()
        .fold(BuildDescriptor::new(project_ref.clone()), |build, (name, value)| {
            build.with_env(name.as_str(), value.as_str())
        });
    debug!("Build variables: {:?}", build.env.keys().collect::<Vec<_>>());

    let build_output = Artifact::output_of(STAGE_BUILD, BUILD_ACTION_NAME);
    let build_action = Action::CodeBuild {
        name: BUILD_ACTION_NAME.to_string(),
        build,
        input: source_output,
        outputs: vec![build_output.clone()],
    };

    // Storage and access
    let bucket_ref = stack.register::<Bucket>(SITE_BUCKET_ID)?;
    let bucket = Bucket {
        removal_policy: RemovalPolicy::Destroy,
    };

    let identity_ref = stack.register::<OriginAccessIdentity>(IDENTITY_ID)?;
    let identity = OriginAccessIdentity {
        comment: format!("Read access to {} for {}", SITE_BUCKET_ID, DISTRIBUTION_ID),
    };

    let mut policy = BucketPolicy::new(bucket_ref.clone());
    policy.add_statement(PolicyStatement::read_objects(
        bucket_ref.clone(),
        identity_ref.clone(),
    ));
    let policy_ref = bucket_ref.child::<BucketPolicy>("Policy");

    // Deploy
    let deploy_action = Action::S3Deploy {
        name: DEPLOY_ACTION_NAME.to_string(),
        bucket: bucket_ref.clone(),
        input: build_output,
        extract: true,
    };

    let pipeline_ref = stack.register::<Pipeline>(PIPELINE_ID)?;
    let pipeline = Pipeline {
        pipeline_name: PIPELINE_ID.to_string(),
        stages: vec![
            Stage::new(STAGE_SOURCE, vec![source_action]),
            Stage::new(STAGE_BUILD, vec![build_action]),
            Stage::new(STAGE_DEPLOY, vec![deploy_action]),
        ],
        restart_execution_on_update: false,
    };

    // Distribution
    let entry_document = config.site.entry_document.as_str();
    let distribution_ref = stack.register::<Distribution>(DISTRIBUTION_ID)?;
    let distribution = Distribution {
        origins: vec![S3Origin {
            bucket: bucket_ref.clone(),
            identity: identity_ref.clone(),
            behaviors: vec![Behavior::default_behavior()],
        }],
        error_responses: FALLBACK_STATUSES
            .iter()
            .map(|status| ErrorResponse::spa_fallback(*status, entry_document))
            .collect(),
        price_class: PriceClass::All,
        default_root_object: entry_document.trim_start_matches('/').to_string(),
        viewer_certificate: ViewerCertificate::CloudFrontDefault,
        aliases: Vec::new(),
    };

    let defined = DeploymentStack {
        construct: stack,
        build_project: Declared::new(project_ref, project),
        bucket: Declared::new(bucket_ref, bucket),
        identity: Declared::new(identity_ref, identity),
        bucket_policy: Declared::new(policy_ref, policy),
        pipeline: Declared::new(pipeline_ref, pipeline),
        distribution: Declared::new(distribution_ref, distribution),
    };

    validate::validate(&defined)?;

    info!(
        "Stack {} defined with {} constructs",
        defined.name(),
        defined.construct.children().len()
    );
    Ok(defined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_WEB_SOCKET_URL;
    use crate::domain::distribution::Ttl;
    use crate::domain::storage::{ACTION_GET_OBJECT, Principal};

    fn config() -> StackConfig {
        StackConfig::new("acme", "chat-app", "ghp_token")
            .with_build_env(ENV_WEB_SOCKET_URL, "wss://chat.example.com")
    }

    #[test]
    fn test_stages_are_source_build_deploy() {
        let stack = define_stack(&config()).unwrap();
        assert_eq!(
            stack.pipeline.props.stage_names(),
            vec!["Source", "Build", "Deploy"]
        );
    }

    #[test]
    fn test_artifacts_chain_between_stages() {
        let stack = define_stack(&config()).unwrap();
        let stages = &stack.pipeline.props.stages;

        for pair in stages.windows(2) {
            assert_eq!(pair[1].inputs(), pair[0].outputs());
        }
    }

    #[test]
    fn test_policy_and_origin_share_identity() {
        let stack = define_stack(&config()).unwrap();
        let statement = &stack.bucket_policy.props.statements[0];

        assert_eq!(statement.actions, vec![ACTION_GET_OBJECT.to_string()]);
        assert_eq!(
            statement.principals,
            vec![Principal::CanonicalUser(stack.identity.handle.clone())]
        );
        assert_eq!(
            stack.distribution.props.origins[0].identity,
            stack.identity.handle
        );
    }

    #[test]
    fn test_distribution_settings() {
        let stack = define_stack(&config()).unwrap();
        let distribution = &stack.distribution.props;
        let behavior = distribution.origins[0].default_behavior().unwrap();

        assert_eq!(behavior.min_ttl, Ttl::ZERO);
        assert_eq!(behavior.default_ttl, Ttl::from_days(1));
        assert_eq!(behavior.max_ttl, Ttl::from_days(365));
        assert_eq!(distribution.price_class, PriceClass::All);
        assert_eq!(distribution.default_root_object, "index.html");

        for status in [403, 404] {
            let rewrite = distribution.error_response_for(status).unwrap();
            assert_eq!(rewrite.response_code, 200);
            assert_eq!(rewrite.response_page_path, "/index.html");
            assert_eq!(rewrite.error_caching_min_ttl, Ttl::ZERO);
        }
    }

    #[test]
    fn test_build_env_is_injected() {
        let stack = define_stack(&config()).unwrap();
        let build = stack.build().unwrap();

        assert_eq!(build.env.len(), 1);
        assert_eq!(
            build.env[ENV_WEB_SOCKET_URL].as_str(),
            "wss://chat.example.com"
        );
        assert_eq!(
            stack.build_project.props.build_spec,
            BuildSpec::FromSourceFilename("buildspec.yml".to_string())
        );
    }

    #[test]
    fn test_bucket_is_destroyed_on_teardown() {
        let stack = define_stack(&config()).unwrap();
        assert_eq!(stack.bucket.props.removal_policy, RemovalPolicy::Destroy);
    }

    #[test]
    fn test_blank_token_fails_at_definition_time() {
        let err = define_stack(&StackConfig::new("acme", "chat-app", "")).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_empty_owner_and_repo_still_define() {
        let stack = define_stack(&StackConfig::new("", "", "ghp_token")).unwrap();
        let source = stack.source().unwrap();
        assert_eq!(source.owner, "");
        assert_eq!(source.repo, "");
    }
}
