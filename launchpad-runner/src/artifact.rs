//! Artifact bundles
//!
//! The contents of a named artifact as it moves between stages: a flat map
//! from relative path to bytes, plus a revision derived from that content.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use launchpad_core::domain::pipeline::Artifact;

/// Files of one artifact, keyed by `/`-separated relative path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBundle {
    pub artifact: Artifact,
    pub revision: String,
    pub files: BTreeMap<String, Vec<u8>>,
}

impl ArtifactBundle {
    /// Creates a bundle and derives its revision from the content
    pub fn new(artifact: Artifact, files: BTreeMap<String, Vec<u8>>) -> Self {
        let revision = content_revision(&files);
        Self {
            artifact,
            revision,
            files,
        }
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files below `directory`, re-rooted at it
    ///
    /// An empty directory (or ".") returns every file.
    pub fn subtree(&self, directory: &str) -> BTreeMap<String, Vec<u8>> {
        let prefix = directory.trim_matches('/');
        if prefix.is_empty() || prefix == "." {
            return self.files.clone();
        }

        let prefix = format!("{}/", prefix);
        self.files
            .iter()
            .filter_map(|(path, bytes)| {
                path.strip_prefix(&prefix)
                    .map(|rest| (rest.to_string(), bytes.clone()))
            })
            .collect()
    }
}

/// SHA-256 over every path and its bytes, in path order
pub fn content_revision(files: &BTreeMap<String, Vec<u8>>) -> String {
    let mut hasher = Sha256::new();
    for (path, bytes) in files {
        hasher.update(path.as_bytes());
        hasher.update([0u8]);
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
        entries
            .iter()
            .map(|(path, body)| (path.to_string(), body.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_revision_tracks_content() {
        let a = ArtifactBundle::new(Artifact::new("a"), files(&[("index.html", "v1")]));
        let b = ArtifactBundle::new(Artifact::new("b"), files(&[("index.html", "v1")]));
        let c = ArtifactBundle::new(Artifact::new("a"), files(&[("index.html", "v2")]));

        assert_eq!(a.revision, b.revision);
        assert_ne!(a.revision, c.revision);
        assert_eq!(a.revision.len(), 64);
    }

    #[test]
    fn test_revision_separates_path_and_content() {
        let a = content_revision(&files(&[("ab", "c")]));
        let b = content_revision(&files(&[("a", "bc")]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_subtree() {
        let bundle = ArtifactBundle::new(
            Artifact::new("source"),
            files(&[
                ("build/index.html", "<html>"),
                ("build/static/app.js", "js"),
                ("src/App.tsx", "tsx"),
                ("buildspec.yml", "version: 0.2"),
            ]),
        );

        let build = bundle.subtree("build");
        assert_eq!(build.len(), 2);
        assert!(build.contains_key("index.html"));
        assert!(build.contains_key("static/app.js"));

        assert_eq!(bundle.subtree("/build/").len(), 2);
        assert_eq!(bundle.subtree(".").len(), 4);
        assert!(bundle.subtree("missing").is_empty());
    }
}
