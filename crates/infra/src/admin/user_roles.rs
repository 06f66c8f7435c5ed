use std::sync::Arc;

use keystone_core::{Record, RecordId, UserId};
use keystone_rbac::{Role, UserRoleBinding};

use super::{AdminError, RecordService};
use crate::store::{Clash, RecordStore};

/// User -> role bindings; at most one active binding per user.
#[derive(Clone)]
pub struct UserRoleService {
    records: RecordService<UserRoleBinding>,
    roles: Arc<dyn RecordStore<Role>>,
}

fn already_bound(user_id: &str) -> AdminError {
    UserRoleBinding::already_bound(user_id).into()
}

/// A store-level clash on a binding write always means the user got bound
/// concurrently.
fn bound_concurrently(user_id: &str, err: AdminError) -> AdminError {
    match err {
        AdminError::Constraint(_) => already_bound(user_id),
        other => other,
    }
}

impl UserRoleService {
    pub fn new(records: RecordService<UserRoleBinding>, roles: Arc<dyn RecordStore<Role>>) -> Self {
        Self { records, roles }
    }

    pub fn records(&self) -> &RecordService<UserRoleBinding> {
        &self.records
    }

    pub async fn create(
        &self,
        mut binding: UserRoleBinding,
        actor: Option<&UserId>,
    ) -> Result<UserRoleBinding, AdminError> {
        binding.user_id = binding.user_id.trim().to_string();
        binding.validate()?;
        self.check_role(binding.role_id)?;

        if self.role_for_user(&binding.user_id)?.is_some() {
            return Err(already_bound(&binding.user_id));
        }

        let user_id = binding.user_id.clone();
        let clash = |b: &UserRoleBinding| b.is_active_binding() && b.user_id == user_id;
        self.records
            .create_unless(binding, actor, Some(&clash))
            .await
            .map_err(|e| bound_concurrently(&user_id, e))
    }

    pub async fn update(
        &self,
        mut binding: UserRoleBinding,
        actor: Option<&UserId>,
    ) -> Result<UserRoleBinding, AdminError> {
        binding.user_id = binding.user_id.trim().to_string();
        binding.validate()?;
        self.check_role(binding.role_id)?;

        let active = binding.meta.status.is_active();
        let candidate = binding.clone();
        if active && !self.records.list_where(|b| candidate.clashes_with(b))?.is_empty() {
            return Err(already_bound(&candidate.user_id));
        }

        // Re-checked under the store lock: another binding may move onto
        // this user while the HSM round trips are in flight.
        let clash = |b: &UserRoleBinding| candidate.clashes_with(b);
        let clash = active.then_some(&clash as Clash<'_, UserRoleBinding>);
        self.records
            .update_unless(binding, actor, clash)
            .await
            .map_err(|e| bound_concurrently(&candidate.user_id, e))
    }

    pub async fn remove(&self, id: RecordId, actor: Option<&UserId>) -> Result<UserRoleBinding, AdminError> {
        self.records.remove(id, actor).await
    }

    pub fn list(&self) -> Result<Vec<UserRoleBinding>, AdminError> {
        self.records.list()
    }

    /// The user's active, live binding, if any.
    pub fn role_for_user(&self, user_id: &str) -> Result<Option<UserRoleBinding>, AdminError> {
        let user_id = user_id.trim();
        Ok(self
            .records
            .list_where(|b| b.is_active_binding() && b.user_id == user_id)?
            .into_iter()
            .next())
    }

    fn check_role(&self, role_id: RecordId) -> Result<(), AdminError> {
        match self.roles.get(role_id)? {
            Some(role) if role.is_live() => Ok(()),
            _ => Err(AdminError::Validation(format!("role {role_id} does not exist"))),
        }
    }
}
