use serde::{Deserialize, Serialize};

use keystone_core::{RecordId, RecordStatus};
use keystone_rbac::{AuditLogEntry, AuditLogFilter, Outcome, RoleUrlBinding, UrlBinding};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 500;

// -------------------------
// Paging
// -------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl PageQuery {
    pub fn bounds(&self) -> (usize, usize) {
        (
            self.offset.unwrap_or(0),
            self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        )
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Page<T> {
        let (offset, limit) = self.bounds();
        Page {
            total: items.len(),
            items: items.into_iter().skip(offset).take(limit).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub total: usize,
    pub items: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub intact: bool,
}

#[derive(Debug, Deserialize)]
pub struct IdRequest {
    pub id: RecordId,
}

// -------------------------
// Roles
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    pub role_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub id: RecordId,
    pub version: u64,
    pub role_name: String,
    pub status: Option<RecordStatus>,
}

// -------------------------
// Classifications
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassificationRequest {
    #[serde(default)]
    pub parent_id: RecordId,
    pub classification_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClassificationRequest {
    pub id: RecordId,
    pub version: u64,
    #[serde(default)]
    pub parent_id: RecordId,
    pub classification_name: String,
    pub status: Option<RecordStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassificationUrlQuery {
    pub classification_id: Option<RecordId>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl ClassificationUrlQuery {
    pub fn page(&self) -> PageQuery {
        PageQuery {
            offset: self.offset,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassificationUrlRequest {
    pub classification_id: RecordId,
    pub url: String,
    #[serde(rename = "methodType")]
    pub method: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClassificationUrlRequest {
    pub id: RecordId,
    pub version: u64,
    pub classification_id: RecordId,
    pub url: String,
    #[serde(rename = "methodType")]
    pub method: Option<String>,
    pub description: Option<String>,
    pub status: Option<RecordStatus>,
}

// -------------------------
// Role / URL edges
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUrlAndRoleRequest {
    /// The URL by id, or by its exact registered path when the id is absent.
    pub url_id: Option<RecordId>,
    pub url: Option<String>,
    #[serde(default)]
    pub role_ids: Vec<RecordId>,
}

/// One controllable URL with the live role edges bound to it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRoles {
    #[serde(flatten)]
    pub url: UrlBinding,
    pub roles: Vec<RoleUrlBinding>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleUrlRequest {
    pub id: RecordId,
    pub version: u64,
    pub url_id: RecordId,
    pub role_id: RecordId,
    pub status: Option<RecordStatus>,
}

// -------------------------
// User / role bindings
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRoleRequest {
    pub user_id: String,
    pub role_id: RecordId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRoleRequest {
    pub id: RecordId,
    pub version: u64,
    pub user_id: String,
    pub role_id: RecordId,
    pub status: Option<RecordStatus>,
}

// -------------------------
// Operation log
// -------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationLogQuery {
    pub user_id: Option<String>,
    pub role_id: Option<String>,
    pub outcome: Option<Outcome>,
    pub url: Option<String>,
    pub request_method: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub keyword: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl OperationLogQuery {
    pub fn into_parts(self) -> (AuditLogFilter, PageQuery) {
        let page = PageQuery {
            offset: self.offset,
            limit: self.limit,
        };
        let filter = AuditLogFilter {
            user_id: self.user_id,
            role_id: self.role_id,
            outcome: self.outcome,
            url: self.url,
            request_method: self.request_method,
            start_time: self.start_time,
            end_time: self.end_time,
            keyword: self.keyword,
        };
        (filter, page)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogRequest {
    pub user_id: Option<String>,
    pub role_id: Option<String>,
    pub url: String,
    pub request_method: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[serde(default)]
    pub outcome: Outcome,
    pub error_msg: Option<String>,
    pub response_time: Option<u64>,
    pub trace_id: Option<String>,
}

impl From<AuditLogRequest> for AuditLogEntry {
    fn from(req: AuditLogRequest) -> Self {
        AuditLogEntry {
            user_id: req.user_id,
            role_id: req.role_id,
            url: req.url,
            request_method: req.request_method.trim().to_ascii_uppercase(),
            ip_address: req.ip_address,
            user_agent: req.user_agent,
            outcome: req.outcome,
            error_msg: req.error_msg,
            response_time: req.response_time,
            trace_id: req.trace_id,
            ..AuditLogEntry::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_are_clamped() {
        let q = PageQuery {
            offset: Some(4),
            limit: Some(10_000),
        };
        assert_eq!(q.bounds(), (4, MAX_PAGE_SIZE));
        assert_eq!(PageQuery::default().bounds(), (0, DEFAULT_PAGE_SIZE));

        let page = PageQuery {
            offset: Some(1),
            limit: Some(2),
        }
        .apply(vec![1, 2, 3, 4]);
        assert_eq!(page.total, 4);
        assert_eq!(page.items, vec![2, 3]);
    }
}
