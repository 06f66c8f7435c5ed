//! `keystone-rbac` — back-office records for URL-based access control.
//!
//! Plain data plus invariants that need no IO. Every type here is a
//! versioned, soft-deletable, signable record.

#[macro_use]
mod meta;

pub mod audit_log;
pub mod classification;
pub mod role;
pub mod role_url;
pub mod user_role;

pub use audit_log::{AuditLogEntry, AuditLogFilter, Outcome};
pub use classification::{build_tree, Classification, ClassificationNode, UrlBinding};
pub use meta::RecordMeta;
pub use role::Role;
pub use role_url::RoleUrlBinding;
pub use user_role::UserRoleBinding;
