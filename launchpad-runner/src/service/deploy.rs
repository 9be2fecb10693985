//! Deploy service
//!
//! Extracts an artifact into a bucket. Objects at matching keys are replaced;
//! keys the artifact does not contain are left alone.

use anyhow::{Context, Result, bail};
use std::sync::Arc;
use tracing::{debug, info};

use crate::artifact::ArtifactBundle;
use crate::store::ObjectStore;

pub struct S3DeployService {
    store: Arc<dyn ObjectStore>,
}

impl S3DeployService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Uploads every file of `bundle`, returning the number of objects written
    pub async fn deploy(&self, bundle: &ArtifactBundle, extract: bool) -> Result<usize> {
        if !extract {
            bail!("Deploying {} without extraction is not supported", bundle.artifact);
        }

        for (key, bytes) in &bundle.files {
            self.store
                .put(key, bytes.clone())
                .await
                .with_context(|| format!("Failed to upload {}", key))?;
            debug!("Uploaded {} ({} bytes)", key, bytes.len());
        }

        info!("Deployed {} object(s) from {}", bundle.len(), bundle.artifact);
        Ok(bundle.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryObjectStore;
    use launchpad_core::domain::pipeline::Artifact;
    use std::collections::BTreeMap;

    fn bundle(entries: &[(&str, &str)]) -> ArtifactBundle {
        let files: BTreeMap<String, Vec<u8>> = entries
            .iter()
            .map(|(p, b)| (p.to_string(), b.as_bytes().to_vec()))
            .collect();
        ArtifactBundle::new(Artifact::new("Artifact_Build_BuildAction"), files)
    }

    #[tokio::test]
    async fn test_redeploy_replaces_matching_keys() {
        let store = Arc::new(InMemoryObjectStore::new());
        let service = S3DeployService::new(store.clone());

        service
            .deploy(&bundle(&[("index.html", "v1"), ("old.js", "old")]), true)
            .await
            .unwrap();
        service
            .deploy(&bundle(&[("index.html", "v2"), ("new.js", "new")]), true)
            .await
            .unwrap();

        assert_eq!(store.get("index.html").await.unwrap(), Some(b"v2".to_vec()));
        assert_eq!(store.get("new.js").await.unwrap(), Some(b"new".to_vec()));
        // Keys missing from the new build stay in place.
        assert_eq!(store.get("old.js").await.unwrap(), Some(b"old".to_vec()));
    }

    #[tokio::test]
    async fn test_unextracted_deploy_is_rejected() {
        let service = S3DeployService::new(Arc::new(InMemoryObjectStore::new()));
        assert!(service.deploy(&bundle(&[("a", "b")]), false).await.is_err());
    }
}
