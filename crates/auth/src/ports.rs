//! Read ports the engine consults. Implementations absorb their own failures.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{RoleId, UrlGrant};

/// Role/permission lookups.
///
/// Infallible by contract: an implementation that cannot reach its backend
/// must answer `None` / empty, never an error, so the engine fails closed.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn role_for_user(&self, user_id: &str) -> Option<RoleId>;

    async fn urls_for_role(&self, role_id: &RoleId) -> Vec<UrlGrant>;
}

/// URL patterns that bypass authorization entirely.
///
/// An unreachable registry answers empty, so nothing is treated as public.
#[async_trait]
pub trait PublicPathRegistry: Send + Sync {
    async fn public_patterns(&self) -> Vec<String>;
}

#[async_trait]
impl<S> PermissionStore for Arc<S>
where
    S: PermissionStore + ?Sized,
{
    async fn role_for_user(&self, user_id: &str) -> Option<RoleId> {
        (**self).role_for_user(user_id).await
    }

    async fn urls_for_role(&self, role_id: &RoleId) -> Vec<UrlGrant> {
        (**self).urls_for_role(role_id).await
    }
}

#[async_trait]
impl<S> PublicPathRegistry for Arc<S>
where
    S: PublicPathRegistry + ?Sized,
{
    async fn public_patterns(&self) -> Vec<String> {
        (**self).public_patterns().await
    }
}

/// A fixed list of public patterns.
#[derive(Debug, Clone, Default)]
pub struct StaticPublicPaths {
    patterns: Vec<String>,
}

impl StaticPublicPaths {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl PublicPathRegistry for StaticPublicPaths {
    async fn public_patterns(&self) -> Vec<String> {
        self.patterns.clone()
    }
}
