//! Append-only operation log.

use serde::{Deserialize, Serialize};

use crate::meta::RecordMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    Success,
    Fail,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Fail => "fail",
        }
    }
}

/// One authorization decision or mutating call, signed so it cannot be
/// altered after the fact.
///
/// The signed content covers who (`user_id`, `role_id`), what (`url`,
/// `request_method`) and the outcome. Entries are never updated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub user_id: Option<String>,
    pub role_id: Option<String>,
    pub url: String,
    pub request_method: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub outcome: Outcome,
    pub error_msg: Option<String>,
    /// Milliseconds spent serving the request, when known.
    pub response_time: Option<u64>,
    pub trace_id: Option<String>,
}

signable_record!(AuditLogEntry => |e| vec![
    e.user_id.clone(),
    e.role_id.clone(),
    Some(e.url.clone()),
    Some(e.request_method.clone()),
    Some(e.outcome.as_str().to_string()),
]);

/// Query over the operation log. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditLogFilter {
    pub user_id: Option<String>,
    pub role_id: Option<String>,
    pub outcome: Option<Outcome>,
    /// Substring of the request URL.
    pub url: Option<String>,
    pub request_method: Option<String>,
    /// Inclusive lower bound on create time (epoch ms).
    pub start_time: Option<i64>,
    /// Inclusive upper bound on create time (epoch ms).
    pub end_time: Option<i64>,
    /// Substring of url, ip address or trace id.
    pub keyword: Option<String>,
}

fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl AuditLogFilter {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(user) = present(&self.user_id) {
            if entry.user_id.as_deref() != Some(user) {
                return false;
            }
        }
        if let Some(role) = present(&self.role_id) {
            if entry.role_id.as_deref() != Some(role) {
                return false;
            }
        }
        if self.outcome.is_some_and(|o| o != entry.outcome) {
            return false;
        }
        if let Some(url) = present(&self.url) {
            if !entry.url.contains(url) {
                return false;
            }
        }
        if let Some(method) = present(&self.request_method) {
            if !entry.request_method.eq_ignore_ascii_case(method) {
                return false;
            }
        }
        let at = entry.meta.audit.create_time;
        if self.start_time.is_some_and(|start| at < start) {
            return false;
        }
        if self.end_time.is_some_and(|end| at > end) {
            return false;
        }
        if let Some(keyword) = present(&self.keyword) {
            let hit = entry.url.contains(keyword)
                || entry.ip_address.as_deref().is_some_and(|ip| ip.contains(keyword))
                || entry.trace_id.as_deref().is_some_and(|t| t.contains(keyword));
            if !hit {
                return false;
            }
        }
        true
    }
}
