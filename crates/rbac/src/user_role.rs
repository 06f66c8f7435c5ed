use serde::{Deserialize, Serialize};

use keystone_core::{DomainError, DomainResult, Record, RecordId};

use crate::meta::RecordMeta;

/// Binds a user to exactly one role.
///
/// At most one active, live binding may exist per user; the admin service
/// enforces this atomically on save through [`UserRoleBinding::clashes_with`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoleBinding {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub user_id: String,
    pub role_id: RecordId,
}

impl UserRoleBinding {
    pub fn new(user_id: impl Into<String>, role_id: RecordId) -> Self {
        Self {
            user_id: user_id.into(),
            role_id,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(DomainError::validation("user id cannot be blank"));
        }
        Ok(())
    }

    /// Counts toward the one-binding-per-user rule.
    pub fn is_active_binding(&self) -> bool {
        self.is_live() && self.meta.status.is_active()
    }

    /// Whether `other` is a different active binding of the same user.
    pub fn clashes_with(&self, other: &UserRoleBinding) -> bool {
        other.meta.id != self.meta.id && other.is_active_binding() && other.user_id == self.user_id
    }

    pub fn already_bound(user_id: &str) -> DomainError {
        DomainError::constraint(format!("user {user_id} is already bound to a role"))
    }
}

signable_record!(UserRoleBinding => |b| vec![
    Some(b.user_id.clone()),
    Some(b.role_id.to_string()),
]);
