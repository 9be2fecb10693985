//! Launchpad Core
//!
//! Core types and abstractions for the Launchpad deployment pipeline.
//!
//! This crate contains:
//! - Configuration: the explicit settings the stack is defined from
//! - Domain types: configuration records for every declared resource
//! - Construct tree: parent/child registration and logical ids
//! - Stack definition, invariant validation and template synthesis

pub mod config;
pub mod construct;
pub mod domain;
pub mod error;
pub mod stack;
pub mod template;
pub mod validate;

pub use config::StackConfig;
pub use error::{ConfigError, DefinitionError};
pub use stack::{DeploymentStack, define_stack};
pub use template::{Template, synthesize};
pub use validate::{ValidationReport, Violation, validate};
