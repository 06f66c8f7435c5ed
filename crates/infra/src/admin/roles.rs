use keystone_core::{RecordId, UserId};
use keystone_rbac::Role;

use super::{AdminError, RecordService};

#[derive(Clone)]
pub struct RoleService {
    records: RecordService<Role>,
}

impl RoleService {
    pub fn new(records: RecordService<Role>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &RecordService<Role> {
        &self.records
    }

    pub async fn create(&self, role: Role, actor: Option<&UserId>) -> Result<Role, AdminError> {
        role.validate()?;
        self.records.create(role, actor).await
    }

    pub async fn update(&self, role: Role, actor: Option<&UserId>) -> Result<Role, AdminError> {
        role.validate()?;
        self.records.update(role, actor).await
    }

    pub async fn remove(&self, id: RecordId, actor: Option<&UserId>) -> Result<Role, AdminError> {
        self.records.remove(id, actor).await
    }

    pub fn get(&self, id: RecordId) -> Result<Role, AdminError> {
        self.records.get(id)
    }

    pub fn list(&self) -> Result<Vec<Role>, AdminError> {
        self.records.list()
    }

    pub async fn verify(&self, id: RecordId) -> Result<bool, AdminError> {
        self.records.verify(id).await
    }
}
