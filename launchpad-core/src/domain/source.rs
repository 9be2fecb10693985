//! Source domain types

use serde::{Deserialize, Serialize};

use crate::config::Secret;

/// How the source host notices new commits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTrigger {
    /// The pipeline engine polls the branch periodically
    Poll,
    /// Nothing starts the pipeline automatically
    None,
}

/// Which repository and branch the source stage watches
///
/// Construction never fails: empty owner, repository or token values are
/// carried as-is and only surface when the source host rejects the fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub trigger: SourceTrigger,
    pub token: Secret,
}

impl SourceDescriptor {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        token: impl Into<Secret>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
            trigger: SourceTrigger::Poll,
            token: token.into(),
        }
    }

    /// `owner/repo`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}
