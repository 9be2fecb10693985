//! Stack validation
//!
//! Checks the invariants that keep an assembled stack deployable. Every check
//! runs and all violations are reported together.

use thiserror::Error;

use crate::domain::distribution::Ttl;
use crate::domain::pipeline::{Action, ActionCategory, STAGE_ORDER};
use crate::domain::storage::{ACTION_GET_OBJECT, Effect, PolicyResource, Principal};
use crate::stack::{DeploymentStack, FALLBACK_STATUSES};

/// A single broken invariant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("bucket policy does not grant {action} on origin {origin}'s objects to {identity}")]
    IdentityNotGranted {
        origin: usize,
        identity: String,
        action: &'static str,
    },

    #[error("bucket policy grants access to everyone")]
    PublicAccess,

    #[error("stages are {actual:?}, expected {expected:?}")]
    StageOrder {
        actual: Vec<String>,
        expected: Vec<String>,
    },

    #[error("stage {stage} consumes {actual:?} but {previous} produces {expected:?}")]
    BrokenArtifactChain {
        stage: String,
        previous: String,
        actual: Vec<String>,
        expected: Vec<String>,
    },

    #[error("stage {stage} holds a {category} action ({action})")]
    MisplacedAction {
        stage: String,
        action: String,
        category: ActionCategory,
    },

    #[error("deploy action {action} targets a bucket the distribution does not serve")]
    DeployTargetNotServed { action: String },

    #[error("behavior {pattern} violates min <= default <= max ({min} / {default} / {max})")]
    TtlOrder {
        pattern: String,
        min: Ttl,
        default: Ttl,
        max: Ttl,
    },

    #[error("origin {origin} has {count} default behaviors, expected exactly one")]
    DefaultBehaviorCount { origin: usize, count: usize },

    #[error("no fallback configured for origin status {status}")]
    MissingFallback { status: u16 },

    #[error("fallback for {status} is misconfigured: {reason}")]
    InvalidFallback { status: u16, reason: String },
}

/// All violations found in a stack
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "stack failed validation with {} violation(s){}",
    .violations.len(),
    list_violations(.violations)
)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

fn list_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|violation| format!("\n  - {}", violation))
        .collect()
}

/// Validates every invariant of `stack`
pub fn validate(stack: &DeploymentStack) -> Result<(), ValidationReport> {
    let mut violations = Vec::new();

    check_identity_binding(stack, &mut violations);
    check_stages(stack, &mut violations);
    check_deploy_target(stack, &mut violations);
    check_behaviors(stack, &mut violations);
    check_fallbacks(stack, &mut violations);

    if violations.is_empty() {
        Ok(())
    } else {
        tracing::warn!("Stack {} has {} violation(s)", stack.name(), violations.len());
        Err(ValidationReport { violations })
    }
}

fn check_identity_binding(stack: &DeploymentStack, violations: &mut Vec<Violation>) {
    let policy = &stack.bucket_policy.props;

    let public = policy.statements.iter().any(|s| {
        s.effect == Effect::Allow && s.principals.iter().any(|p| *p == Principal::Anyone)
    });
    if public {
        violations.push(Violation::PublicAccess);
    }

    for (index, origin) in stack.distribution.props.origins.iter().enumerate() {
        let objects = PolicyResource::AllObjects(origin.bucket.clone());
        let granted = policy.bucket == origin.bucket
            && policy.statements.iter().any(|s| {
                s.effect == Effect::Allow
                    && s.actions.iter().any(|a| a == ACTION_GET_OBJECT)
                    && s.identities().any(|id| *id == origin.identity)
                    && s.resources.contains(&objects)
            });

        if !granted {
            violations.push(Violation::IdentityNotGranted {
                origin: index,
                identity: origin.identity.path().to_string(),
                action: ACTION_GET_OBJECT,
            });
        }
    }
}

fn check_stages(stack: &DeploymentStack, violations: &mut Vec<Violation>) {
    let stages = &stack.pipeline.props.stages;
    let names = stack.pipeline.props.stage_names();

    if names != STAGE_ORDER {
        violations.push(Violation::StageOrder {
            actual: names.iter().map(|s| s.to_string()).collect(),
            expected: STAGE_ORDER.iter().map(|s| s.to_string()).collect(),
        });
    }

    for stage in stages {
        for action in &stage.actions {
            if action.category().to_string() != stage.name {
                violations.push(Violation::MisplacedAction {
                    stage: stage.name.clone(),
                    action: action.name().to_string(),
                    category: action.category(),
                });
            }
        }
    }

    let first_inputs = stages.first().map(|s| s.inputs()).unwrap_or_default();
    if let Some(first) = stages.first().filter(|_| !first_inputs.is_empty()) {
        violations.push(Violation::BrokenArtifactChain {
            stage: first.name.clone(),
            previous: "(none)".to_string(),
            actual: first_inputs.iter().map(|a| a.name().to_string()).collect(),
            expected: Vec::new(),
        });
    }

    for pair in stages.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        let expected = previous.outputs();
        let actual = current.inputs();

        if actual != expected {
            violations.push(Violation::BrokenArtifactChain {
                stage: current.name.clone(),
                previous: previous.name.clone(),
                actual: actual.iter().map(|a| a.name().to_string()).collect(),
                expected: expected.iter().map(|a| a.name().to_string()).collect(),
            });
        }
    }
}

fn check_deploy_target(stack: &DeploymentStack, violations: &mut Vec<Violation>) {
    let origins = &stack.distribution.props.origins;

    for stage in &stack.pipeline.props.stages {
        for action in &stage.actions {
            if let Action::S3Deploy { name, bucket, .. } = action {
                if !origins.iter().any(|o| o.bucket == *bucket) {
                    violations.push(Violation::DeployTargetNotServed {
                        action: name.clone(),
                    });
                }
            }
        }
    }
}

fn check_behaviors(stack: &DeploymentStack, violations: &mut Vec<Violation>) {
    for (index, origin) in stack.distribution.props.origins.iter().enumerate() {
        let count = origin.behaviors.iter().filter(|b| b.is_default).count();
        if count != 1 {
            violations.push(Violation::DefaultBehaviorCount {
                origin: index,
                count,
            });
        }

        for behavior in &origin.behaviors {
            let ordered = behavior.min_ttl <= behavior.default_ttl
                && behavior.default_ttl <= behavior.max_ttl;
            if !ordered {
                violations.push(Violation::TtlOrder {
                    pattern: behavior.path_pattern.clone(),
                    min: behavior.min_ttl,
                    default: behavior.default_ttl,
                    max: behavior.max_ttl,
                });
            }
        }
    }
}

fn check_fallbacks(stack: &DeploymentStack, violations: &mut Vec<Violation>) {
    let distribution = &stack.distribution.props;
    let entry_document = format!("/{}", distribution.default_root_object);

    for status in FALLBACK_STATUSES {
        let Some(rewrite) = distribution.error_response_for(status) else {
            violations.push(Violation::MissingFallback { status });
            continue;
        };

        let mut reasons = Vec::new();
        if rewrite.response_code != 200 {
            reasons.push(format!("responds {} instead of 200", rewrite.response_code));
        }
        if rewrite.response_page_path != entry_document {
            reasons.push(format!(
                "serves {} instead of {}",
                rewrite.response_page_path, entry_document
            ));
        }
        if !rewrite.error_caching_min_ttl.is_zero() {
            reasons.push(format!(
                "caches the rewrite for {}",
                rewrite.error_caching_min_ttl
            ));
        }

        if !reasons.is_empty() {
            violations.push(Violation::InvalidFallback {
                status,
                reason: reasons.join(", "),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::construct::{Ref, Stack};
    use crate::domain::distribution::{Behavior, ErrorResponse};
    use crate::domain::storage::{Bucket, OriginAccessIdentity, PolicyStatement};
    use crate::stack::define_stack;

    fn stack() -> DeploymentStack {
        define_stack(&StackConfig::new("acme", "chat-app", "ghp_token")).unwrap()
    }

    fn violations(stack: &DeploymentStack) -> Vec<Violation> {
        validate(stack).unwrap_err().violations
    }

    fn foreign_bucket() -> Ref<Bucket> {
        Stack::new("Other").unwrap().register::<Bucket>("Elsewhere").unwrap()
    }

    fn identity_not_granted(stack: &DeploymentStack) -> bool {
        matches!(violations(stack).as_slice(), [Violation::IdentityNotGranted { origin: 0, .. }])
    }

    #[test]
    fn test_defined_stack_is_valid() {
        assert!(validate(&stack()).is_ok());
    }

    #[test]
    fn test_foreign_identity_on_origin_is_rejected() {
        let mut stack = stack();
        let mut other = Stack::new("Other").unwrap();
        let stranger = other.register::<OriginAccessIdentity>("Stranger").unwrap();
        stack.distribution.props.origins[0].identity = stranger;

        assert!(matches!(
            violations(&stack).as_slice(),
            [Violation::IdentityNotGranted { origin: 0, .. }]
        ));
    }

    #[test]
    fn test_public_policy_is_rejected() {
        let mut stack = stack();
        let mut statement = PolicyStatement::read_objects(
            stack.bucket.handle.clone(),
            stack.identity.handle.clone(),
        );
        statement.principals = vec![Principal::Anyone];
        stack.bucket_policy.props.add_statement(statement);

        assert_eq!(violations(&stack), vec![Violation::PublicAccess]);
    }

    #[test]
    fn test_reordered_stages_are_rejected() {
        let mut stack = stack();
        stack.pipeline.props.stages.swap(1, 2);

        let found = violations(&stack);
        assert!(found.iter().any(|v| matches!(v, Violation::StageOrder { .. })));
        assert!(found.iter().any(|v| matches!(v, Violation::BrokenArtifactChain { .. })));
    }

    #[test]
    fn test_ttl_order_is_checked() {
        let mut stack = stack();
        let behavior = &mut stack.distribution.props.origins[0].behaviors[0];
        behavior.default_ttl = Ttl::from_days(400);

        assert!(matches!(
            violations(&stack).as_slice(),
            [Violation::TtlOrder { .. }]
        ));
    }

    #[test]
    fn test_cached_fallback_is_rejected() {
        let mut stack = stack();
        let distribution = &mut stack.distribution.props;
        distribution.error_responses[0].error_caching_min_ttl = Ttl::from_secs(300);

        assert!(matches!(
            violations(&stack).as_slice(),
            [Violation::InvalidFallback { status: 403, .. }]
        ));
    }

    #[test]
    fn test_missing_fallback_is_rejected() {
        let mut stack = stack();
        stack
            .distribution
            .props
            .error_responses
            .retain(|r| r.error_code != 404);

        assert_eq!(
            violations(&stack),
            vec![Violation::MissingFallback { status: 404 }]
        );
    }

    #[test]
    fn test_fallback_must_serve_entry_document() {
        let mut stack = stack();
        stack.distribution.props.error_responses[1] =
            ErrorResponse::spa_fallback(404, "/404.html");

        let report = validate(&stack).unwrap_err();
        assert!(report.to_string().contains("serves /404.html instead of /index.html"));
    }

    #[test]
    fn test_grant_on_bucket_arn_only_is_rejected() {
        let mut stack = stack();
        let site = stack.bucket.handle.clone();
        stack.bucket_policy.props.statements[0].resources = vec![PolicyResource::Bucket(site)];

        assert!(identity_not_granted(&stack));
    }

    #[test]
    fn test_grant_on_other_bucket_is_rejected() {
        let mut stack = stack();
        stack.bucket_policy.props.statements[0].resources =
            vec![PolicyResource::AllObjects(foreign_bucket())];

        assert!(identity_not_granted(&stack));
    }

    #[test]
    fn test_grant_without_resources_is_rejected() {
        let mut stack = stack();
        stack.bucket_policy.props.statements[0].resources.clear();

        assert!(identity_not_granted(&stack));
    }

    #[test]
    fn test_action_in_wrong_stage_is_rejected() {
        let mut stack = stack();
        let stages = &mut stack.pipeline.props.stages;
        let deploy = stages[2].actions.remove(0);
        stages[1].actions.push(deploy);

        let found = violations(&stack);
        assert!(found.contains(&Violation::MisplacedAction {
            stage: "Build".to_string(),
            action: "DeployAction".to_string(),
            category: ActionCategory::Deploy,
        }));
    }

    #[test]
    fn test_source_stage_with_inputs_is_rejected() {
        let mut stack = stack();
        let stages = &mut stack.pipeline.props.stages;
        let deploy = stages[2].actions[0].clone();
        stages[0].actions.push(deploy);

        let found = violations(&stack);
        assert!(found.iter().any(|v| matches!(
            v,
            Violation::BrokenArtifactChain { stage, previous, .. }
                if stage == "Source" && previous == "(none)"
        )));
        assert!(found.iter().any(|v| matches!(v, Violation::MisplacedAction { .. })));
    }

    #[test]
    fn test_deploy_to_unserved_bucket_is_rejected() {
        let mut stack = stack();
        if let Action::S3Deploy { bucket, .. } = &mut stack.pipeline.props.stages[2].actions[0] {
            *bucket = foreign_bucket();
        }

        assert_eq!(
            violations(&stack),
            vec![Violation::DeployTargetNotServed {
                action: "DeployAction".to_string()
            }]
        );
    }

    #[test]
    fn test_origin_without_default_behavior_is_rejected() {
        let mut stack = stack();
        stack.distribution.props.origins[0].behaviors[0].is_default = false;

        assert_eq!(
            violations(&stack),
            vec![Violation::DefaultBehaviorCount {
                origin: 0,
                count: 0
            }]
        );
    }

    #[test]
    fn test_origin_with_two_default_behaviors_is_rejected() {
        let mut stack = stack();
        stack.distribution.props.origins[0].behaviors.push(Behavior::default_behavior());

        assert_eq!(
            violations(&stack),
            vec![Violation::DefaultBehaviorCount {
                origin: 0,
                count: 2
            }]
        );
    }

    #[test]
    fn test_report_lists_every_violation() {
        let mut stack = stack();
        stack.bucket_policy.props.statements[0].resources.clear();
        stack.distribution.props.origins[0].behaviors[0].is_default = false;

        let report = validate(&stack).unwrap_err();
        let message = report.to_string();
        assert!(message.starts_with("stack failed validation with 2 violation(s)"));
        assert_eq!(message.lines().count(), 3);
    }
}
