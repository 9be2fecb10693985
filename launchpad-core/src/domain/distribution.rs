//! Distribution domain types
//!
//! The edge caching layer in front of the site bucket: TTL rules, the origin
//! it reads from, and the error rewrites that let a single-page application
//! own its routes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::construct::Ref;
use crate::domain::storage::{Bucket, OriginAccessIdentity};

const SECONDS_PER_DAY: u64 = 86_400;

/// Cache lifetime in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ttl(u64);

impl Ttl {
    pub const ZERO: Ttl = Ttl(0);

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub const fn from_days(days: u64) -> Self {
        Self(days * SECONDS_PER_DAY)
    }

    pub const fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 != 0 && self.0 % SECONDS_PER_DAY == 0 {
            write!(f, "{}d", self.0 / SECONDS_PER_DAY)
        } else {
            write!(f, "{}s", self.0)
        }
    }
}

/// HTTP methods a behavior forwards to the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllowedMethods {
    GetHead,
    GetHeadOptions,
}

impl AllowedMethods {
    pub fn methods(&self) -> &'static [&'static str] {
        match self {
            AllowedMethods::GetHead => &["GET", "HEAD"],
            AllowedMethods::GetHeadOptions => &["GET", "HEAD", "OPTIONS"],
        }
    }
}

/// Cache rule for requests matching a path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Behavior {
    pub path_pattern: String,
    pub is_default: bool,
    pub min_ttl: Ttl,
    pub default_ttl: Ttl,
    pub max_ttl: Ttl,
    pub allowed_methods: AllowedMethods,
    pub compress: bool,
}

impl Behavior {
    /// Default behavior: every path, 0 <= 1 day <= 365 days
    pub fn default_behavior() -> Self {
        Self {
            path_pattern: "*".to_string(),
            is_default: true,
            min_ttl: Ttl::ZERO,
            default_ttl: Ttl::from_days(1),
            max_ttl: Ttl::from_days(365),
            allowed_methods: AllowedMethods::GetHead,
            compress: true,
        }
    }

    /// Lifetime of a response the origin sent without caching headers
    pub fn effective_ttl(&self) -> Ttl {
        self.default_ttl.clamp(self.min_ttl, self.max_ttl.max(self.min_ttl))
    }

    /// Whether `path` falls under this behavior's pattern
    ///
    /// Patterns support a single trailing `*` wildcard; `*` alone matches
    /// everything.
    pub fn matches(&self, path: &str) -> bool {
        let pattern = self.path_pattern.trim_start_matches('/');
        let path = path.trim_start_matches('/');
        match pattern.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => path == pattern,
        }
    }
}

/// Rewrite applied when the origin answers with an error status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error_code: u16,
    pub response_code: u16,
    pub response_page_path: String,
    pub error_caching_min_ttl: Ttl,
}

impl ErrorResponse {
    /// Serve `entry_document` with 200 and never cache the rewrite
    pub fn spa_fallback(error_code: u16, entry_document: &str) -> Self {
        Self {
            error_code,
            response_code: 200,
            response_page_path: entry_document.to_string(),
            error_caching_min_ttl: Ttl::ZERO,
        }
    }
}

/// Geographic footprint of the edge cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceClass {
    /// Every edge location
    All,
    /// Most regions, excluding the most expensive
    Class200,
    /// North America and Europe only
    Class100,
}

impl PriceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceClass::All => "PriceClass_All",
            PriceClass::Class200 => "PriceClass_200",
            PriceClass::Class100 => "PriceClass_100",
        }
    }
}

/// TLS certificate presented to viewers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerCertificate {
    /// The provider's default certificate on its own domain, no aliases
    CloudFrontDefault,
}

/// Bucket origin read through an access identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Origin {
    pub bucket: Ref<Bucket>,
    pub identity: Ref<OriginAccessIdentity>,
    pub behaviors: Vec<Behavior>,
}

impl S3Origin {
    pub fn default_behavior(&self) -> Option<&Behavior> {
        self.behaviors.iter().find(|b| b.is_default)
    }
}

/// Edge caching with single-page-application fallback rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub origins: Vec<S3Origin>,
    pub error_responses: Vec<ErrorResponse>,
    pub price_class: PriceClass,
    pub default_root_object: String,
    pub viewer_certificate: ViewerCertificate,
    pub aliases: Vec<String>,
}

impl Distribution {
    /// Rewrite configured for an origin status, if any
    pub fn error_response_for(&self, status: u16) -> Option<&ErrorResponse> {
        self.error_responses.iter().find(|r| r.error_code == status)
    }

    /// Behavior that applies to `path`: the first matching non-default
    /// behavior, otherwise the default one
    pub fn behavior_for(&self, path: &str) -> Option<&Behavior> {
        let origin = self.origins.first()?;
        origin
            .behaviors
            .iter()
            .find(|b| !b.is_default && b.matches(path))
            .or_else(|| origin.default_behavior())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_units() {
        assert_eq!(Ttl::from_days(1).as_secs(), 86_400);
        assert_eq!(Ttl::from_days(365).as_secs(), 31_536_000);
        assert_eq!(Ttl::from_days(1).to_string(), "1d");
        assert_eq!(Ttl::from_secs(90).to_string(), "90s");
        assert_eq!(Ttl::ZERO.to_string(), "0s");
    }

    #[test]
    fn test_default_behavior_ordering() {
        let behavior = Behavior::default_behavior();
        assert!(behavior.min_ttl <= behavior.default_ttl);
        assert!(behavior.default_ttl <= behavior.max_ttl);
        assert_eq!(behavior.effective_ttl(), Ttl::from_days(1));
    }

    #[test]
    fn test_effective_ttl_is_clamped() {
        let mut behavior = Behavior::default_behavior();
        behavior.default_ttl = Ttl::from_days(400);
        assert_eq!(behavior.effective_ttl(), Ttl::from_days(365));

        behavior.min_ttl = Ttl::from_secs(60);
        behavior.default_ttl = Ttl::ZERO;
        assert_eq!(behavior.effective_ttl(), Ttl::from_secs(60));
    }

    #[test]
    fn test_path_patterns() {
        let mut behavior = Behavior::default_behavior();
        assert!(behavior.matches("/anything/at/all"));

        behavior.path_pattern = "/static/*".to_string();
        assert!(behavior.matches("/static/app.js"));
        assert!(!behavior.matches("/index.html"));

        behavior.path_pattern = "/robots.txt".to_string();
        assert!(behavior.matches("/robots.txt"));
        assert!(!behavior.matches("/robots.txt.bak"));
    }

    #[test]
    fn test_spa_fallback() {
        let rewrite = ErrorResponse::spa_fallback(404, "/index.html");
        assert_eq!(rewrite.response_code, 200);
        assert_eq!(rewrite.response_page_path, "/index.html");
        assert!(rewrite.error_caching_min_ttl.is_zero());
    }
}
