//! URL-permission authorization.
//!
//! The engine is a pure decision function over the state its ports report:
//! no mutation, no caching of its own, and no error path. Remote failures are
//! absorbed by the ports and surface here as "no role" / "no paths", so every
//! outage degrades to Deny or Unauthenticated.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use keystone_core::UserId;

use crate::permissions::matches_public_pattern;
use crate::{PermissionStore, PublicPathRegistry, RoleId, UrlGrant};

/// Why a request was let through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllowReason {
    /// Nothing to protect.
    EmptyUrl,
    PublicPath { pattern: String },
    Granted { role: RoleId, url: String },
}

/// Why an identified user was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// No role bound to the user (or the permission store is unreachable).
    NoRole,
    /// The role exists but owns no URL bindings.
    NoBindings,
    /// No binding covers this URL and method.
    NoMatch,
}

impl DenyReason {
    pub fn message(self) -> &'static str {
        match self {
            DenyReason::NoRole => "no role bound to user",
            DenyReason::NoBindings => "role has no url permissions",
            DenyReason::NoMatch => "no permission for this url and method",
        }
    }
}

/// Outcome of one authorization check.
///
/// Callers map `Unauthenticated` to 401 and `Deny` to 403.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    Allow(AllowReason),
    Deny {
        role: Option<RoleId>,
        reason: DenyReason,
    },
    Unauthenticated,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    /// The role the decision was made against, when one was resolved.
    pub fn role_id(&self) -> Option<&RoleId> {
        match self {
            Decision::Allow(AllowReason::Granted { role, .. }) => Some(role),
            Decision::Deny { role, .. } => role.as_ref(),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::Allow(_) => "allow",
            Decision::Deny { .. } => "deny",
            Decision::Unauthenticated => "unauthenticated",
        }
    }
}

/// Decides `(user, url, method)` against public paths and role bindings.
///
/// The three lookups (public paths, role for user, urls for role) run strictly
/// in sequence, and only as far as the decision needs them.
#[derive(Clone)]
pub struct AuthorizationEngine {
    permissions: Arc<dyn PermissionStore>,
    public_paths: Arc<dyn PublicPathRegistry>,
}

impl AuthorizationEngine {
    pub fn new(
        permissions: Arc<dyn PermissionStore>,
        public_paths: Arc<dyn PublicPathRegistry>,
    ) -> Self {
        Self {
            permissions,
            public_paths,
        }
    }

    pub async fn decide(
        &self,
        user_id: Option<&str>,
        request_url: &str,
        request_method: &str,
    ) -> Decision {
        let decision = self.evaluate(user_id, request_url, request_method).await;

        let user = user_id.unwrap_or_default();
        match &decision {
            Decision::Allow(_) => {
                debug!(user_id = user, url = request_url, method = request_method, outcome = decision.label(), "authorization decided");
            }
            _ => {
                info!(user_id = user, url = request_url, method = request_method, outcome = decision.label(), "authorization refused");
            }
        }
        decision
    }

    async fn evaluate(
        &self,
        user_id: Option<&str>,
        request_url: &str,
        request_method: &str,
    ) -> Decision {
        if request_url.trim().is_empty() {
            return Decision::Allow(AllowReason::EmptyUrl);
        }

        let public = self.public_paths.public_patterns().await;
        if let Some(pattern) = public
            .into_iter()
            .find(|p| matches_public_pattern(p, request_url))
        {
            return Decision::Allow(AllowReason::PublicPath { pattern });
        }

        let Some(user) = UserId::parse_present(user_id) else {
            return Decision::Unauthenticated;
        };

        let Some(role) = self.permissions.role_for_user(user.as_str()).await else {
            return Decision::Deny {
                role: None,
                reason: DenyReason::NoRole,
            };
        };

        let grants = self.permissions.urls_for_role(&role).await;
        if grants.is_empty() {
            return Decision::Deny {
                role: Some(role),
                reason: DenyReason::NoBindings,
            };
        }

        match find_grant(&grants, request_url, request_method) {
            Some(grant) => Decision::Allow(AllowReason::Granted {
                url: grant.url.clone(),
                role,
            }),
            None => Decision::Deny {
                role: Some(role),
                reason: DenyReason::NoMatch,
            },
        }
    }
}

fn find_grant<'a>(grants: &'a [UrlGrant], url: &str, method: &str) -> Option<&'a UrlGrant> {
    grants.iter().find(|g| g.permits(url, method))
}

impl core::fmt::Debug for AuthorizationEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthorizationEngine").finish_non_exhaustive()
    }
}
