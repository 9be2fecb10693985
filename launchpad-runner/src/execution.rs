//! Pipeline execution
//!
//! Plays a stack's pipeline once. Stages run strictly in declaration order and
//! every action reads its inputs from the artifacts produced before it, looked
//! up by name. The first failing stage halts the run; later stages are
//! recorded as skipped.

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use launchpad_core::construct::{ConstructPath, Ref};
use launchpad_core::domain::pipeline::{Action, Artifact, Stage};
use launchpad_core::domain::run::{
    LogEntry, LogLevel, RunRecord, RunStatus, StageRecord, StageStatus,
};
use launchpad_core::domain::storage::Bucket;
use launchpad_core::stack::DeploymentStack;

use crate::artifact::ArtifactBundle;
use crate::service::{BuildExecutor, S3DeployService, SourceError, SourcePoller, SourceProvider};
use crate::store::ObjectStore;

/// Runs a stack's pipeline against local services
pub struct PipelineExecutor {
    source: Arc<dyn SourceProvider>,
    builder: Arc<dyn BuildExecutor>,
    buckets: HashMap<ConstructPath, Arc<dyn ObjectStore>>,
}

impl PipelineExecutor {
    pub fn new(source: Arc<dyn SourceProvider>, builder: Arc<dyn BuildExecutor>) -> Self {
        Self {
            source,
            builder,
            buckets: HashMap::new(),
        }
    }

    /// Binds a declared bucket to the store deploy actions write into
    pub fn with_bucket(mut self, bucket: &Ref<Bucket>, store: Arc<dyn ObjectStore>) -> Self {
        self.buckets.insert(bucket.path().clone(), store);
        self
    }

    /// Executes every stage of the stack's pipeline
    ///
    /// Never fails as a whole: failures are recorded on the returned run.
    pub async fn run(&self, stack: &DeploymentStack) -> RunRecord {
        let pipeline = &stack.pipeline.props;
        let mut run = Run {
            record: RunRecord::start(pipeline.pipeline_name.as_str()),
            artifacts: HashMap::new(),
        };
        run.log_info(format!("Starting {} run {}", pipeline.pipeline_name, run.record.id));

        let mut halted = false;
        for stage in &pipeline.stages {
            if halted {
                run.log_warning(format!("Skipping stage {}", stage.name));
                run.record.stages.push(StageRecord::skipped(stage.name.as_str()));
                continue;
            }

            let started_at = Utc::now();
            run.log_info(format!("Stage {} started", stage.name));
            let outcome = self.execute_stage(stack, stage, &mut run).await;

            let (status, error_message) = match outcome {
                Ok(()) => {
                    run.log_info(format!("Stage {} succeeded", stage.name));
                    (StageStatus::Succeeded, None)
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    run.log_error(format!("Stage {} failed: {}", stage.name, message));
                    halted = true;
                    (StageStatus::Failed, Some(message))
                }
            };

            run.record.stages.push(StageRecord {
                name: stage.name.clone(),
                status,
                started_at: Some(started_at),
                completed_at: Some(Utc::now()),
                error_message,
            });
        }

        let mut record = run.record;
        record.status = if halted {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };
        record.completed_at = Some(Utc::now());
        info!("Run {} finished: {:?}", record.id, record.status);
        record
    }

    /// Runs the pipeline only when the watched branch has moved past `since`
    ///
    /// Returns `None` without running anything when the head is still `since`.
    pub async fn run_if_changed(
        &self,
        stack: &DeploymentStack,
        since: &str,
    ) -> Result<Option<RunRecord>, SourceError> {
        if let Some(source) = stack.source() {
            let mut poller = SourcePoller::new(self.source.as_ref()).starting_at(since);
            if poller.poll(source).await?.is_none() {
                info!("{} is still at {}, nothing to run", source.full_name(), since);
                return Ok(None);
            }
        }
        Ok(Some(self.run(stack).await))
    }

    async fn execute_stage(
        &self,
        stack: &DeploymentStack,
        stage: &Stage,
        run: &mut Run,
    ) -> Result<()> {
        for action in &stage.actions {
            debug!("{} / {} ({})", stage.name, action.name(), action.category());
            self.execute_action(stack, action, run)
                .await
                .with_context(|| format!("Action {} failed", action.name()))?;
        }
        Ok(())
    }

    async fn execute_action(
        &self,
        stack: &DeploymentStack,
        action: &Action,
        run: &mut Run,
    ) -> Result<()> {
        match action {
            Action::GitHubSource { source, output, .. } => {
                let bundle = self.source.fetch(source, output).await?;
                run.log_info(format!(
                    "Fetched {}@{} at {}",
                    source.full_name(),
                    source.branch,
                    bundle.revision
                ));
                run.record.source_revision = Some(bundle.revision.clone());
                run.bind(bundle);
            }
            Action::CodeBuild {
                build,
                input,
                outputs,
                ..
            } => {
                if build.project != stack.build_project.handle {
                    bail!("Build project {} is not declared", build.project.path());
                }
                let project = &stack.build_project.props;
                let input = run.artifact(input)?.clone();
                if !build.env.is_empty() {
                    run.log_info(format!(
                        "Injecting {} into {}",
                        build.env.keys().cloned().collect::<Vec<_>>().join(", "),
                        project.project_name
                    ));
                }

                for output in outputs {
                    let bundle = self.builder.build(project, &input, &build.env, output).await?;
                    run.log_info(format!(
                        "{} produced {} ({} files)",
                        project.project_name,
                        output,
                        bundle.len()
                    ));
                    run.bind(bundle);
                }
            }
            Action::S3Deploy {
                bucket,
                input,
                extract,
                ..
            } => {
                let store = self
                    .buckets
                    .get(bucket.path())
                    .ok_or_else(|| anyhow!("No store bound to bucket {}", bucket.path()))?;
                let bundle = run.artifact(input)?;
                let written = S3DeployService::new(store.clone())
                    .deploy(bundle, *extract)
                    .await?;
                run.log_info(format!("Deployed {} object(s) to {}", written, bucket.path()));
            }
        }
        Ok(())
    }
}

/// State carried across the stages of one run
struct Run {
    record: RunRecord,
    artifacts: HashMap<Artifact, ArtifactBundle>,
}

impl Run {
    fn bind(&mut self, bundle: ArtifactBundle) {
        self.artifacts.insert(bundle.artifact.clone(), bundle);
    }

    fn artifact(&self, artifact: &Artifact) -> Result<&ArtifactBundle> {
        self.artifacts
            .get(artifact)
            .ok_or_else(|| anyhow!("Artifact {} was not produced by an earlier stage", artifact))
    }

    fn log_info(&mut self, message: String) {
        info!("{}", message);
        self.add_log(LogLevel::Info, message);
    }

    fn log_warning(&mut self, message: String) {
        warn!("{}", message);
        self.add_log(LogLevel::Warning, message);
    }

    fn log_error(&mut self, message: String) {
        error!("{}", message);
        self.add_log(LogLevel::Error, message);
    }

    fn add_log(&mut self, level: LogLevel, message: String) {
        self.record.logs.push(LogEntry {
            timestamp: Utc::now(),
            level,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{LocalDirectorySource, PrebuiltOutputBuild};
    use crate::store::{InMemoryObjectStore, StoreError};
    use async_trait::async_trait;
    use launchpad_core::config::StackConfig;
    use launchpad_core::define_stack;
    use launchpad_core::domain::source::SourceDescriptor;
    use tempfile::TempDir;

    struct RejectingSource;

    #[async_trait]
    impl SourceProvider for RejectingSource {
        async fn latest_revision(&self, source: &SourceDescriptor) -> Result<String, SourceError> {
            Err(SourceError::Unauthorized(source.full_name()))
        }

        async fn fetch(
            &self,
            source: &SourceDescriptor,
            _output: &Artifact,
        ) -> Result<ArtifactBundle, SourceError> {
            Err(SourceError::Unauthorized(source.full_name()))
        }
    }

    struct ReadOnlyStore;

    #[async_trait]
    impl ObjectStore for ReadOnlyStore {
        async fn put(&self, key: &str, _bytes: Vec<u8>) -> Result<(), StoreError> {
            Err(StoreError::Rejected {
                key: key.to_string(),
                reason: "access denied".to_string(),
            })
        }

        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(None)
        }

        async fn keys(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn stack() -> DeploymentStack {
        define_stack(&StackConfig::new("acme", "chat-app", "ghp_token")).unwrap()
    }

    fn working_tree(with_spec: bool) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("build/static")).unwrap();
        if with_spec {
            std::fs::write(dir.path().join("buildspec.yml"), "version: 0.2").unwrap();
        }
        std::fs::write(dir.path().join("build/index.html"), "<html>v1").unwrap();
        std::fs::write(dir.path().join("build/static/app.js"), "js v1").unwrap();
        dir
    }

    fn executor(
        dir: &TempDir,
        stack: &DeploymentStack,
        store: Arc<dyn ObjectStore>,
    ) -> PipelineExecutor {
        PipelineExecutor::new(
            Arc::new(LocalDirectorySource::new(dir.path())),
            Arc::new(PrebuiltOutputBuild::new("build")),
        )
        .with_bucket(&stack.bucket.handle, store)
    }

    fn statuses(record: &RunRecord) -> Vec<StageStatus> {
        record.stages.iter().map(|s| s.status).collect()
    }

    #[tokio::test]
    async fn test_successful_run_deploys_build_output() {
        let dir = working_tree(true);
        let stack = stack();
        let store = Arc::new(InMemoryObjectStore::new());

        let record = executor(&dir, &stack, store.clone()).run(&stack).await;

        assert!(record.succeeded());
        assert_eq!(statuses(&record), vec![StageStatus::Succeeded; 3]);
        assert!(record.source_revision.is_some());
        assert!(record.completed_at.is_some());
        assert_eq!(
            store.keys().await.unwrap(),
            vec!["index.html".to_string(), "static/app.js".to_string()]
        );
    }

    #[tokio::test]
    async fn test_build_env_is_logged() {
        let dir = working_tree(true);
        let config = StackConfig::new("acme", "chat-app", "ghp_token")
            .with_build_env("REACT_APP_WEB_SOCKET_URL", "wss://chat.example.com");
        let stack = define_stack(&config).unwrap();

        let record = executor(&dir, &stack, Arc::new(InMemoryObjectStore::new()))
            .run(&stack)
            .await;

        assert!(record.succeeded());
        assert!(
            record
                .logs
                .iter()
                .any(|l| l.message.contains("REACT_APP_WEB_SOCKET_URL"))
        );
    }

    #[tokio::test]
    async fn test_source_failure_skips_later_stages() {
        let stack = stack();
        let store = Arc::new(InMemoryObjectStore::new());
        let executor = PipelineExecutor::new(
            Arc::new(RejectingSource),
            Arc::new(PrebuiltOutputBuild::new("build")),
        )
        .with_bucket(&stack.bucket.handle, store.clone());

        let record = executor.run(&stack).await;

        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(
            statuses(&record),
            vec![StageStatus::Failed, StageStatus::Skipped, StageStatus::Skipped]
        );
        let failed = record.failed_stage().unwrap();
        assert_eq!(failed.name, "Source");
        assert!(failed.error_message.as_ref().unwrap().contains("credentials"));
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_build_spec_fails_build() {
        let dir = working_tree(false);
        let stack = stack();
        let store = Arc::new(InMemoryObjectStore::new());

        let record = executor(&dir, &stack, store.clone()).run(&stack).await;

        assert_eq!(
            statuses(&record),
            vec![StageStatus::Succeeded, StageStatus::Failed, StageStatus::Skipped]
        );
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_upload_fails_deploy() {
        let dir = working_tree(true);
        let stack = stack();

        let record = executor(&dir, &stack, Arc::new(ReadOnlyStore)).run(&stack).await;

        assert_eq!(record.failed_stage().unwrap().name, "Deploy");
        assert!(
            record
                .logs
                .iter()
                .any(|l| l.level == LogLevel::Error && l.message.contains("access denied"))
        );
    }

    #[tokio::test]
    async fn test_unbound_bucket_fails_deploy() {
        let dir = working_tree(true);
        let stack = stack();
        let executor = PipelineExecutor::new(
            Arc::new(LocalDirectorySource::new(dir.path())),
            Arc::new(PrebuiltOutputBuild::new("build")),
        );

        let record = executor.run(&stack).await;
        assert_eq!(record.failed_stage().unwrap().name, "Deploy");
    }

    #[tokio::test]
    async fn test_redeploy_serves_latest_build() {
        let dir = working_tree(true);
        let stack = stack();
        let store = Arc::new(InMemoryObjectStore::new());
        let executor = executor(&dir, &stack, store.clone());

        let first = executor.run(&stack).await;
        std::fs::write(dir.path().join("build/index.html"), "<html>v2").unwrap();
        std::fs::write(dir.path().join("build/static/app.js"), "js v2").unwrap();
        let second = executor.run(&stack).await;

        assert!(first.succeeded() && second.succeeded());
        assert_ne!(first.source_revision, second.source_revision);
        assert_eq!(store.get("index.html").await.unwrap(), Some(b"<html>v2".to_vec()));
        assert_eq!(store.get("static/app.js").await.unwrap(), Some(b"js v2".to_vec()));
    }

    #[tokio::test]
    async fn test_unchanged_branch_is_not_rerun() {
        let dir = working_tree(true);
        let stack = stack();
        let executor = executor(&dir, &stack, Arc::new(InMemoryObjectStore::new()));

        let first = executor.run(&stack).await;
        let head = first.source_revision.unwrap();
        let rerun = executor.run_if_changed(&stack, &head).await.unwrap();
        assert!(rerun.is_none());

        std::fs::write(dir.path().join("build/index.html"), "<html>v2").unwrap();
        let record = executor.run_if_changed(&stack, &head).await.unwrap().unwrap();
        assert!(record.succeeded());
        assert_ne!(record.source_revision, Some(head));
    }

    #[tokio::test]
    async fn test_rejected_poll_is_an_error() {
        let stack = stack();
        let executor = PipelineExecutor::new(
            Arc::new(RejectingSource),
            Arc::new(PrebuiltOutputBuild::new("build")),
        );

        let err = executor.run_if_changed(&stack, "abc").await.unwrap_err();
        assert!(matches!(err, SourceError::Unauthorized(_)));
    }
}
