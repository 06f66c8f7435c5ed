//! Versioned, soft-deletable record model shared by every back-office entity.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{RecordId, UserId};

/// Current UTC time as epoch milliseconds (the timestamp unit of every record).
pub fn utc_now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Lifecycle status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Active,
    Disabled,
}

impl RecordStatus {
    /// Numeric code used in canonical (hashed) content.
    pub fn code(self) -> i32 {
        match self {
            RecordStatus::Active => 1,
            RecordStatus::Disabled => 0,
        }
    }

    pub fn is_active(self) -> bool {
        self == RecordStatus::Active
    }
}

/// Who created/changed a record and when (epoch millis, UTC).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFields {
    pub creator: Option<UserId>,
    pub create_time: i64,
    pub updater: Option<UserId>,
    pub update_time: Option<i64>,
}

impl AuditFields {
    pub fn created(&mut self, actor: Option<&UserId>, now: i64) {
        if let Some(actor) = actor {
            self.creator = Some(actor.clone());
        }
        self.create_time = now;
    }

    pub fn updated(&mut self, actor: Option<&UserId>, now: i64) {
        if let Some(actor) = actor {
            self.updater = Some(actor.clone());
        }
        self.update_time = Some(now);
    }

    /// The timestamp that signed content is bound to: last update, else creation.
    pub fn effective_time(&self) -> i64 {
        self.update_time.unwrap_or(self.create_time)
    }
}

/// Shared interface of a versioned, soft-deletable record.
///
/// Every persisted back-office entity implements this once; generic services
/// and stores then handle creation defaults, logical deletion and optimistic
/// locking uniformly.
pub trait Record {
    fn id(&self) -> RecordId;

    fn set_id(&mut self, id: RecordId);

    /// Optimistic-lock version of the stored state.
    fn version(&self) -> u64;

    fn set_version(&mut self, version: u64);

    fn status(&self) -> RecordStatus;

    fn set_status(&mut self, status: RecordStatus);

    fn is_deleted(&self) -> bool;

    fn set_deleted(&mut self, deleted: bool);

    /// Numeric status code as it appears in canonical content.
    fn status_code(&self) -> i32 {
        self.status().code()
    }

    fn mark_deleted(&mut self) {
        self.set_deleted(true);
    }

    fn audit(&self) -> &AuditFields;

    fn audit_mut(&mut self) -> &mut AuditFields;

    /// Live = not logically deleted.
    fn is_live(&self) -> bool {
        !self.is_deleted()
    }
}

/// Optimistic concurrency expectation for a record write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (first insert, migrations, etc.).
    Any,
    /// Require the stored record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_time_prefers_update_time() {
        let mut audit = AuditFields::default();
        audit.created(Some(&UserId::new("admin")), 1_000);
        assert_eq!(audit.effective_time(), 1_000);

        audit.updated(None, 2_000);
        assert_eq!(audit.effective_time(), 2_000);
        assert_eq!(audit.updater, None);
        assert_eq!(audit.creator, Some(UserId::new("admin")));
    }

    #[test]
    fn expected_version_rejects_stale_writes() {
        assert!(ExpectedVersion::Any.check(7).is_ok());
        assert!(ExpectedVersion::Exact(3).check(3).is_ok());
        assert!(matches!(
            ExpectedVersion::Exact(2).check(3),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(RecordStatus::Active.code(), 1);
        assert_eq!(RecordStatus::Disabled.code(), 0);
        assert_eq!(
            serde_json::to_string(&RecordStatus::Disabled).unwrap(),
            "\"disabled\""
        );
    }
}
