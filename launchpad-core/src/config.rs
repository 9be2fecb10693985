//! Stack configuration
//!
//! Defines every value the deployment stack is assembled from: which
//! repository and branch to watch, how to build it, and what the distribution
//! serves as its entry document.
//!
//! Values are read once from the process environment (the CLI seeds it from a
//! `.env` file first) and handed to [`crate::stack::define_stack`]. The
//! configuration is immutable after that point.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::error::ConfigError;

pub const ENV_STACK_NAME: &str = "LAUNCHPAD_STACK_NAME";
pub const ENV_SOURCE_OWNER: &str = "SOURCE_ACTION_OWNER";
pub const ENV_SOURCE_REPO: &str = "SOURCE_ACTION_REPO";
pub const ENV_SOURCE_BRANCH: &str = "SOURCE_ACTION_BRANCH";
pub const ENV_SOURCE_TOKEN: &str = "SOURCE_ACTION_GITHUB_TOKEN";
pub const ENV_BUILD_SPEC_FILE: &str = "BUILD_SPEC_FILE";
pub const ENV_WEB_SOCKET_URL: &str = "REACT_APP_WEB_SOCKET_URL";
pub const ENV_ENTRY_DOCUMENT: &str = "SITE_ENTRY_DOCUMENT";

pub const DEFAULT_STACK_NAME: &str = "LaunchpadStack";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_BUILD_SPEC: &str = "buildspec.yml";
pub const DEFAULT_ENTRY_DOCUMENT: &str = "/index.html";

/// Build-time variables copied from the environment into the build stage
pub const FORWARDED_BUILD_VARS: &[&str] = &[ENV_WEB_SOCKET_URL];

/// A credential that never appears in logs or debug output
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw value
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True when the value is empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Repository the source stage polls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub token: Secret,
}

/// Build stage settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Build specification file, relative to the repository root
    pub spec_file: String,

    /// Plaintext variables injected into the build environment
    pub env: BTreeMap<String, String>,
}

/// What the distribution serves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Document returned for unknown paths (e.g. "/index.html")
    pub entry_document: String,
}

/// Complete configuration for one deployment stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    pub stack_name: String,
    pub source: SourceConfig,
    pub build: BuildConfig,
    pub site: SiteConfig,
}

impl StackConfig {
    /// Creates a configuration with defaults for everything but the repository
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<Secret>,
    ) -> Self {
        Self {
            stack_name: DEFAULT_STACK_NAME.to_string(),
            source: SourceConfig {
                owner: owner.into(),
                repo: repo.into(),
                branch: DEFAULT_BRANCH.to_string(),
                token: token.into(),
            },
            build: BuildConfig {
                spec_file: DEFAULT_BUILD_SPEC.to_string(),
                env: BTreeMap::new(),
            },
            site: SiteConfig {
                entry_document: DEFAULT_ENTRY_DOCUMENT.to_string(),
            },
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - SOURCE_ACTION_GITHUB_TOKEN (required)
    /// - SOURCE_ACTION_OWNER (optional, default: "")
    /// - SOURCE_ACTION_REPO (optional, default: "")
    /// - SOURCE_ACTION_BRANCH (optional, default: main)
    /// - BUILD_SPEC_FILE (optional, default: buildspec.yml)
    /// - REACT_APP_WEB_SOCKET_URL (optional, injected into the build when set)
    /// - SITE_ENTRY_DOCUMENT (optional, default: /index.html)
    /// - LAUNCHPAD_STACK_NAME (optional, default: LaunchpadStack)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`StackConfig::from_env`] with an injectable variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(ENV_SOURCE_TOKEN)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_SOURCE_TOKEN))?;

        let mut config = Self::new(
            lookup(ENV_SOURCE_OWNER).unwrap_or_default(),
            lookup(ENV_SOURCE_REPO).unwrap_or_default(),
            token,
        );

        if let Some(name) = lookup(ENV_STACK_NAME) {
            config.stack_name = name;
        }
        if let Some(branch) = lookup(ENV_SOURCE_BRANCH) {
            config.source.branch = branch;
        }
        if let Some(spec_file) = lookup(ENV_BUILD_SPEC_FILE) {
            config.build.spec_file = spec_file;
        }
        if let Some(entry) = lookup(ENV_ENTRY_DOCUMENT) {
            config.site.entry_document = entry;
        }

        for &name in FORWARDED_BUILD_VARS {
            match lookup(name) {
                Some(value) => {
                    config.build.env.insert(name.to_string(), value);
                }
                None => warn!("{} is not set; the build runs without it", name),
            }
        }

        Ok(config)
    }

    /// Adds a build environment variable
    pub fn with_build_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.build.env.insert(name.into(), value.into());
        self
    }

    /// Validates the configuration
    ///
    /// A blank token is rejected here so that the failure happens at
    /// definition time instead of on the first poll. Blank owner or repository
    /// names are only warned about; the source host reports those.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.token.is_blank() {
            return Err(ConfigError::Missing(ENV_SOURCE_TOKEN));
        }

        if self.stack_name.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_STACK_NAME));
        }

        if self.source.branch.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_SOURCE_BRANCH));
        }

        if self.build.spec_file.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_BUILD_SPEC_FILE));
        }

        if !self.site.entry_document.starts_with('/') || self.site.entry_document.len() < 2 {
            return Err(ConfigError::invalid(
                ENV_ENTRY_DOCUMENT,
                "must be an absolute object path such as /index.html",
            ));
        }

        for name in self.build.env.keys() {
            if name.is_empty() || name.contains('=') || name.chars().any(char::is_whitespace) {
                return Err(ConfigError::invalid(
                    format!("build variable {:?}", name),
                    "names must be non-empty and contain no '=' or whitespace",
                ));
            }
        }

        if self.source.owner.trim().is_empty() {
            warn!("{} is empty; the source stage will fail to fetch", ENV_SOURCE_OWNER);
        }
        if self.source.repo.trim().is_empty() {
            warn!("{} is empty; the source stage will fail to fetch", ENV_SOURCE_REPO);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_from_minimal_env() {
        let config =
            StackConfig::from_lookup(lookup_from(&[(ENV_SOURCE_TOKEN, "ghp_x")])).unwrap();

        assert_eq!(config.stack_name, DEFAULT_STACK_NAME);
        assert_eq!(config.source.branch, "main");
        assert_eq!(config.source.owner, "");
        assert_eq!(config.source.repo, "");
        assert_eq!(config.build.spec_file, "buildspec.yml");
        assert_eq!(config.site.entry_document, "/index.html");
        assert!(config.build.env.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reads_every_variable() {
        let config = StackConfig::from_lookup(lookup_from(&[
            (ENV_SOURCE_TOKEN, "ghp_x"),
            (ENV_SOURCE_OWNER, "acme"),
            (ENV_SOURCE_REPO, "chat-app"),
            (ENV_SOURCE_BRANCH, "release"),
            (ENV_WEB_SOCKET_URL, "wss://chat.example.com"),
            (ENV_STACK_NAME, "ChatStack"),
        ]))
        .unwrap();

        assert_eq!(config.source.owner, "acme");
        assert_eq!(config.source.repo, "chat-app");
        assert_eq!(config.source.branch, "release");
        assert_eq!(config.stack_name, "ChatStack");
        assert_eq!(
            config.build.env.get(ENV_WEB_SOCKET_URL).map(String::as_str),
            Some("wss://chat.example.com")
        );
    }

    #[test]
    fn test_missing_token_fails_closed() {
        let err =
            StackConfig::from_lookup(lookup_from(&[(ENV_SOURCE_OWNER, "acme")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_SOURCE_TOKEN));

        let err =
            StackConfig::from_lookup(lookup_from(&[(ENV_SOURCE_TOKEN, "   ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(ENV_SOURCE_TOKEN));
    }

    #[test]
    fn test_validate_rejects_blank_token() {
        let config = StackConfig::new("acme", "chat-app", "");
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::Missing(ENV_SOURCE_TOKEN)
        );
    }

    #[test]
    fn test_validate_accepts_empty_owner_and_repo() {
        let config = StackConfig::new("", "", "ghp_x");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_entry_document() {
        let mut config = StackConfig::new("acme", "chat-app", "ghp_x");

        config.site.entry_document = "index.html".to_string();
        assert!(config.validate().is_err());

        config.site.entry_document = "/".to_string();
        assert!(config.validate().is_err());

        config.site.entry_document = "/app.html".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_build_env_names() {
        let config = StackConfig::new("acme", "chat-app", "ghp_x").with_build_env("A=B", "x");
        assert!(config.validate().is_err());

        let config = StackConfig::new("acme", "chat-app", "ghp_x").with_build_env("API_URL", "x");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secret_is_redacted() {
        let config = StackConfig::new("acme", "chat-app", "ghp_supersecret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("ghp_supersecret"));
        assert_eq!(config.source.token.to_string(), "***");
        assert_eq!(config.source.token.expose(), "ghp_supersecret");
    }
}
