//! Launchpad Runner
//!
//! Local preview engine for a deployment stack. It plays the pipeline against
//! stand-ins for the managed services so a stack's behaviour can be checked
//! before it is provisioned.
//!
//! Architecture:
//! - Store: in-memory object storage standing in for the site bucket
//! - Services: source fetch, build packaging and bucket deploy (trait-based)
//! - Execution: runs stages strictly in order, binding artifacts by name
//! - Edge: answers requests the way the configured distribution would
//!
//! None of this replaces the managed services; build commands are never run
//! and no provider API is called.

pub mod artifact;
pub mod edge;
pub mod execution;
pub mod service;
pub mod store;

pub use artifact::ArtifactBundle;
pub use edge::{EdgePreview, EdgeResponse};
pub use execution::PipelineExecutor;
pub use store::{InMemoryObjectStore, ObjectStore, StoreError};
