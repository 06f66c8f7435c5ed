use serde::{Deserialize, Serialize};

use keystone_core::{DomainError, DomainResult};

use crate::meta::RecordMeta;

/// A named bundle of URL permissions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub role_name: String,
}

impl Role {
    pub fn new(role_name: impl Into<String>) -> Self {
        Self {
            role_name: role_name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.role_name.trim().is_empty() {
            return Err(DomainError::validation("role name cannot be blank"));
        }
        Ok(())
    }
}

signable_record!(Role => |r| vec![Some(r.role_name.clone())]);
