//! Edge preview
//!
//! Answers viewer requests the way the configured distribution would: the
//! root path serves the default root object, objects missing from the bucket
//! come back from the origin as 403 (the access identity cannot list), and
//! configured error rewrites hand the entry document to client-side routing.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use launchpad_core::domain::distribution::{Distribution, Ttl};
use launchpad_core::stack::DeploymentStack;

use crate::store::{ObjectStore, StoreError};

/// Status the origin returns for keys it cannot read
const ORIGIN_MISSING_STATUS: u16 = 403;

/// What a viewer receives for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Object key the body was read from, if any
    pub served_key: Option<String>,
    pub from_cache: bool,
    /// Origin status replaced by an error rewrite
    pub rewritten_from: Option<u16>,
}

#[derive(Debug, Clone)]
struct CachedResponse {
    response: EdgeResponse,
    expires_at: DateTime<Utc>,
}

pub struct EdgePreview {
    distribution: Distribution,
    store: Arc<dyn ObjectStore>,
    cache: Mutex<HashMap<String, CachedResponse>>,
}

impl EdgePreview {
    pub fn new(distribution: Distribution, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            distribution,
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Preview of the stack's distribution reading from `store`
    pub fn for_stack(stack: &DeploymentStack, store: Arc<dyn ObjectStore>) -> Self {
        Self::new(stack.distribution.props.clone(), store)
    }

    /// Serves `path` as of `now`
    pub async fn request(
        &self,
        path: &str,
        now: DateTime<Utc>,
    ) -> Result<EdgeResponse, StoreError> {
        let key = self.object_key(path);

        if let Some(cached) = self.cache().get(&key) {
            if cached.expires_at > now {
                debug!("Cache hit for {}", key);
                let mut response = cached.response.clone();
                response.from_cache = true;
                return Ok(response);
            }
        }

        let (response, ttl) = match self.store.get(&key).await? {
            Some(body) => {
                let ttl = self
                    .distribution
                    .behavior_for(path)
                    .map(|b| b.effective_ttl())
                    .unwrap_or(Ttl::ZERO);
                let response = EdgeResponse {
                    status: 200,
                    body,
                    served_key: Some(key.clone()),
                    from_cache: false,
                    rewritten_from: None,
                };
                (response, ttl)
            }
            None => self.origin_error(ORIGIN_MISSING_STATUS).await?,
        };

        match expiry(now, ttl) {
            Some(expires_at) => {
                self.cache().insert(
                    key,
                    CachedResponse {
                        response: response.clone(),
                        expires_at,
                    },
                );
            }
            None => {
                self.cache().remove(&key);
            }
        }
        Ok(response)
    }

    /// Drops every cached response
    pub fn invalidate_all(&self) {
        let mut cache = self.cache();
        debug!("Invalidating {} cached response(s)", cache.len());
        cache.clear();
    }

    /// Applies the configured rewrite for an origin error status
    async fn origin_error(&self, status: u16) -> Result<(EdgeResponse, Ttl), StoreError> {
        let unrewritten = EdgeResponse {
            status,
            body: Vec::new(),
            served_key: None,
            from_cache: false,
            rewritten_from: None,
        };

        let Some(rewrite) = self.distribution.error_response_for(status) else {
            return Ok((unrewritten, Ttl::ZERO));
        };

        let page = rewrite.response_page_path.trim_start_matches('/').to_string();
        match self.store.get(&page).await? {
            Some(body) => {
                debug!("Rewriting {} to {} {}", status, rewrite.response_code, page);
                let response = EdgeResponse {
                    status: rewrite.response_code,
                    body,
                    served_key: Some(page),
                    from_cache: false,
                    rewritten_from: Some(status),
                };
                Ok((response, rewrite.error_caching_min_ttl))
            }
            None => Ok((unrewritten, Ttl::ZERO)),
        }
    }

    fn object_key(&self, path: &str) -> String {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let key = path.trim_start_matches('/');
        if key.is_empty() {
            self.distribution.default_root_object.clone()
        } else {
            key.to_string()
        }
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, CachedResponse>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// When a response cached at `now` for `ttl` expires
///
/// `None` means the response is not cached: a zero TTL, or one too large to
/// represent as a timestamp.
fn expiry(now: DateTime<Utc>, ttl: Ttl) -> Option<DateTime<Utc>> {
    if ttl.is_zero() {
        return None;
    }
    let secs = i64::try_from(ttl.as_secs()).ok()?;
    now.checked_add_signed(TimeDelta::try_seconds(secs)?)
}
