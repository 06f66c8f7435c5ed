use serde::{Deserialize, Serialize};

use keystone_core::{DomainError, Record, RecordId};

use crate::meta::RecordMeta;

/// Edge between a role and a classification URL.
///
/// `role_name` is a snapshot taken when the edge is created; it is not kept
/// in sync with later renames.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUrlBinding {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub url_id: RecordId,
    pub role_id: RecordId,
    pub role_name: Option<String>,
}

impl RoleUrlBinding {
    pub fn new(url_id: RecordId, role_id: RecordId) -> Self {
        Self {
            url_id,
            role_id,
            ..Self::default()
        }
    }

    /// A different live edge between the same role and URL.
    pub fn duplicates(&self, other: &RoleUrlBinding) -> bool {
        other.meta.id != self.meta.id
            && other.is_live()
            && other.url_id == self.url_id
            && other.role_id == self.role_id
    }

    pub fn already_bound(&self) -> DomainError {
        DomainError::constraint(format!(
            "role {} is already bound to url {}",
            self.role_id, self.url_id
        ))
    }
}

signable_record!(RoleUrlBinding => |b| vec![
    Some(b.url_id.to_string()),
    Some(b.role_id.to_string()),
]);
