use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use keystone_auth::{PermissionStore, RoleId, UrlGrant};

use super::{call_with_budget, RemoteError, RetryPolicy, TtlCache};
use crate::config::RemoteConfig;

const CACHE_CAPACITY: usize = 10_000;

/// Where role and URL permissions actually come from. May fail.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn role_for_user(&self, user_id: &str) -> Result<Option<RoleId>, RemoteError>;

    async fn urls_for_role(&self, role_id: &RoleId) -> Result<Vec<UrlGrant>, RemoteError>;
}

#[async_trait]
impl<S> PermissionSource for Arc<S>
where
    S: PermissionSource + ?Sized,
{
    async fn role_for_user(&self, user_id: &str) -> Result<Option<RoleId>, RemoteError> {
        (**self).role_for_user(user_id).await
    }

    async fn urls_for_role(&self, role_id: &RoleId) -> Result<Vec<UrlGrant>, RemoteError> {
        (**self).urls_for_role(role_id).await
    }
}

/// [`PermissionStore`] over a fallible source.
///
/// Each lookup is bounded by a timeout and a retry budget. Whatever still
/// fails becomes "no role" / "no urls", which the engine turns into Deny.
/// Successful answers may be cached for a bounded TTL.
pub struct FailClosedPermissionStore<S> {
    source: S,
    timeout: Duration,
    retry: RetryPolicy,
    roles: TtlCache<String, Option<RoleId>>,
    urls: TtlCache<RoleId, Vec<UrlGrant>>,
}

impl<S> FailClosedPermissionStore<S>
where
    S: PermissionSource,
{
    pub fn new(source: S, config: &RemoteConfig) -> Self {
        Self {
            source,
            timeout: config.timeout,
            retry: config.retry_policy(),
            roles: TtlCache::new(config.permission_cache_ttl, CACHE_CAPACITY),
            urls: TtlCache::new(config.permission_cache_ttl, CACHE_CAPACITY),
        }
    }

    /// Drop cached answers, e.g. after an admin change to bindings.
    pub fn invalidate(&self) {
        self.roles.invalidate_all();
        self.urls.invalidate_all();
    }
}

#[async_trait]
impl<S> PermissionStore for FailClosedPermissionStore<S>
where
    S: PermissionSource,
{
    async fn role_for_user(&self, user_id: &str) -> Option<RoleId> {
        if let Some(hit) = self.roles.get(&user_id.to_string()) {
            return hit;
        }

        let source = &self.source;
        match call_with_budget(self.timeout, &self.retry, move || source.role_for_user(user_id)).await {
            Ok(role) => {
                self.roles.insert(user_id.to_string(), role.clone());
                role
            }
            Err(e) => {
                warn!(adapter = "permission.role_for_user", error = e.class(), "permission lookup failed; denying");
                None
            }
        }
    }

    async fn urls_for_role(&self, role_id: &RoleId) -> Vec<UrlGrant> {
        if let Some(hit) = self.urls.get(role_id) {
            return hit;
        }

        let source = &self.source;
        match call_with_budget(self.timeout, &self.retry, move || source.urls_for_role(role_id)).await {
            Ok(urls) => {
                self.urls.insert(role_id.clone(), urls.clone());
                urls
            }
            Err(e) => {
                warn!(adapter = "permission.urls_for_role", error = e.class(), "permission lookup failed; denying");
                Vec::new()
            }
        }
    }
}
