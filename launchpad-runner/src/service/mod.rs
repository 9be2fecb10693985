//! Service layer
//!
//! Stand-ins for the managed services each stage delegates to. Every service
//! is trait-based so the executor can be driven by local implementations in
//! the preview and by fakes in tests.

mod build;
mod deploy;
mod source;

// Re-export traits
pub use build::BuildExecutor;
pub use source::SourceProvider;

// Re-export implementations
pub use build::PrebuiltOutputBuild;
pub use deploy::S3DeployService;
pub use source::{LocalDirectorySource, SourceError, SourcePoller};
