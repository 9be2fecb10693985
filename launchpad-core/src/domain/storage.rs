//! Storage and access domain types

use serde::{Deserialize, Serialize};

use crate::construct::Ref;

pub const ACTION_GET_OBJECT: &str = "s3:GetObject";

/// What happens to a resource when the stack is torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

impl RemovalPolicy {
    /// Value of the template's `DeletionPolicy` attribute
    pub fn deletion_policy(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
        }
    }
}

/// Object storage bucket holding the deployed site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub removal_policy: RemovalPolicy,
}

/// Identity the distribution uses to read the bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginAccessIdentity {
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Who a policy statement applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// The canonical user of an origin access identity
    CanonicalUser(Ref<OriginAccessIdentity>),
    /// Anyone, i.e. public access
    Anyone,
}

/// What a policy statement applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyResource {
    /// Every object in the bucket (`<bucket arn>/*`)
    AllObjects(Ref<Bucket>),
    /// The bucket itself
    Bucket(Ref<Bucket>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStatement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub principals: Vec<Principal>,
    pub resources: Vec<PolicyResource>,
}

impl PolicyStatement {
    /// Read-only object access for one access identity
    pub fn read_objects(bucket: Ref<Bucket>, identity: Ref<OriginAccessIdentity>) -> Self {
        Self {
            effect: Effect::Allow,
            actions: vec![ACTION_GET_OBJECT.to_string()],
            principals: vec![Principal::CanonicalUser(identity)],
            resources: vec![PolicyResource::AllObjects(bucket)],
        }
    }

    /// Access identities this statement names as principals
    pub fn identities(&self) -> impl Iterator<Item = &Ref<OriginAccessIdentity>> {
        self.principals.iter().filter_map(|principal| match principal {
            Principal::CanonicalUser(identity) => Some(identity),
            Principal::Anyone => None,
        })
    }
}

/// Resource policy attached to a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPolicy {
    pub bucket: Ref<Bucket>,
    pub statements: Vec<PolicyStatement>,
}

impl BucketPolicy {
    pub fn new(bucket: Ref<Bucket>) -> Self {
        Self {
            bucket,
            statements: Vec::new(),
        }
    }

    pub fn add_statement(&mut self, statement: PolicyStatement) {
        self.statements.push(statement);
    }
}
