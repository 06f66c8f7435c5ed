//! Permission source answering from this service's own admin records.

use async_trait::async_trait;

use keystone_auth::{RoleId, UrlGrant};
use keystone_core::{Record, RecordId};

use super::{PermissionSource, RemoteError};
use crate::admin::{AdminError, AdminServices};

#[derive(Clone)]
pub struct DirectoryPermissionSource {
    services: AdminServices,
}

impl DirectoryPermissionSource {
    pub fn new(services: AdminServices) -> Self {
        Self { services }
    }

    fn role_is_usable(&self, role_id: RecordId) -> Result<bool, RemoteError> {
        let role = self.services.roles.records().find(role_id).map_err(backend)?;
        Ok(role.is_some_and(|r| r.is_live() && r.meta.status.is_active()))
    }
}

fn backend(e: AdminError) -> RemoteError {
    RemoteError::Backend(e.to_string())
}

#[async_trait]
impl PermissionSource for DirectoryPermissionSource {
    async fn role_for_user(&self, user_id: &str) -> Result<Option<RoleId>, RemoteError> {
        let Some(binding) = self.services.user_roles.role_for_user(user_id).map_err(backend)? else {
            return Ok(None);
        };
        if !self.role_is_usable(binding.role_id)? {
            return Ok(None);
        }
        Ok(Some(RoleId::new(binding.role_id.to_string())))
    }

    async fn urls_for_role(&self, role_id: &RoleId) -> Result<Vec<UrlGrant>, RemoteError> {
        let Ok(id) = role_id.as_str().parse::<RecordId>() else {
            return Ok(Vec::new());
        };
        if !self.role_is_usable(id)? {
            return Ok(Vec::new());
        }

        let urls = self.services.role_urls.urls_for_role(id).map_err(backend)?;
        Ok(urls
            .into_iter()
            .map(|u| UrlGrant {
                id: Some(u.id().to_string()),
                url: u.url,
                method: u.method,
            })
            .collect())
    }
}
