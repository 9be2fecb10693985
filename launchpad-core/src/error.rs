//! Error types for stack definition

use thiserror::Error;

use crate::validate::ValidationReport;

/// Errors raised while reading or checking configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or blank
    #[error("{0} must be set to a non-empty value")]
    Missing(&'static str),

    /// A variable holds a value that cannot be used
    #[error("Invalid value for {name}: {reason}")]
    Invalid {
        /// Name of the offending setting
        name: String,
        /// Why the value was rejected
        reason: String,
    },
}

impl ConfigError {
    /// Create an invalid-value error
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while assembling the construct tree
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The configuration was rejected before any construct was registered
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Two children of the same stack share an id
    #[error("Construct '{id}' is already registered in stack '{stack}'")]
    DuplicateConstruct {
        /// Id of the stack
        stack: String,
        /// Id that was registered twice
        id: String,
    },

    /// A construct id is empty or contains a path separator
    #[error("Invalid construct id: {0:?}")]
    InvalidConstructId(String),

    /// The assembled stack breaks one or more invariants
    #[error(transparent)]
    Validation(#[from] ValidationReport),
}

impl DefinitionError {
    /// Check if this error came from configuration rather than assembly
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
