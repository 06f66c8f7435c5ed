//! Signed, append-only audit trail of authorization decisions and writes.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use keystone_auth::Decision;
use keystone_core::{utc_now_millis, AuditFields, Record, RecordId, RecordStatus, UserId};
use keystone_integrity::{IntegrityError, IntegrityGuard};
use keystone_rbac::{AuditLogEntry, AuditLogFilter, Outcome};

use crate::admin::AdminError;
use crate::ids::IdGenerator;
use crate::store::AuditLogStore;

/// Request metadata attached to a decision entry.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub user_id: Option<String>,
    pub url: String,
    pub method: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub trace_id: Option<String>,
    pub response_time: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub total: usize,
    pub items: Vec<AuditLogEntry>,
}

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditLogStore>,
    guard: IntegrityGuard,
    ids: Arc<IdGenerator>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditLogStore>, guard: IntegrityGuard, ids: Arc<IdGenerator>) -> Self {
        Self { store, guard, ids }
    }

    /// One entry for one authorization decision.
    pub async fn record_decision(
        &self,
        decision: &Decision,
        meta: RequestMeta,
    ) -> Result<AuditLogEntry, AdminError> {
        let user_id = UserId::parse_present(meta.user_id.as_deref());
        let (outcome, error_msg) = match decision {
            Decision::Allow(_) => (Outcome::Success, None),
            Decision::Deny { reason, .. } => (Outcome::Fail, Some(reason.message().to_string())),
            Decision::Unauthenticated => (Outcome::Fail, Some("unauthenticated".to_string())),
        };

        let entry = AuditLogEntry {
            user_id: user_id.as_ref().map(|u| u.as_str().to_string()),
            role_id: decision.role_id().map(|r| r.as_str().to_string()),
            url: meta.url,
            request_method: meta.method.to_ascii_uppercase(),
            ip_address: meta.ip_address,
            user_agent: meta.user_agent,
            outcome,
            error_msg,
            response_time: meta.response_time,
            trace_id: meta.trace_id,
            ..AuditLogEntry::default()
        };
        self.record(entry, user_id.as_ref()).await
    }

    pub async fn record(&self, entry: AuditLogEntry, actor: Option<&UserId>) -> Result<AuditLogEntry, AdminError> {
        let mut stored = self.record_batch(vec![entry], actor).await?;
        stored
            .pop()
            .ok_or_else(|| AdminError::Validation("empty audit batch".to_string()))
    }

    /// Stamp and append a batch. Creator, create time, version and deletion
    /// defaults are applied uniformly; nothing is stored unless every entry
    /// was signed.
    pub async fn record_batch(
        &self,
        entries: Vec<AuditLogEntry>,
        actor: Option<&UserId>,
    ) -> Result<Vec<AuditLogEntry>, AdminError> {
        if entries.iter().any(|e| e.url.trim().is_empty()) {
            return Err(AdminError::Validation("audit entry url cannot be blank".to_string()));
        }

        let now = utc_now_millis();
        let mut stamped = Vec::with_capacity(entries.len());
        for mut entry in entries {
            entry.set_id(self.ids.next_id());
            entry.set_version(0);
            entry.set_deleted(false);
            entry.set_status(RecordStatus::Active);
            entry.meta.audit = AuditFields::default();
            entry.meta.audit.created(actor, now);

            let id = entry.id();
            self.guard.sign(&mut entry).await.map_err(|e| {
                error!(operation = "audit.record", %id, "signing failed; audit write aborted");
                AdminError::from(e)
            })?;
            stamped.push(entry);
        }

        self.store.append(stamped.clone())?;
        debug!(count = stamped.len(), "audit entries appended");
        Ok(stamped)
    }

    pub fn get(&self, id: RecordId) -> Result<AuditLogEntry, AdminError> {
        self.store
            .get(id)?
            .ok_or_else(|| AdminError::not_found("audit entry", id))
    }

    /// Matching entries, newest first.
    pub fn list(&self, filter: &AuditLogFilter, offset: usize, limit: usize) -> Result<AuditPage, AdminError> {
        let mut matching: Vec<AuditLogEntry> = self
            .store
            .list()?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        matching.sort_by(|a, b| {
            (b.meta.audit.create_time, b.id()).cmp(&(a.meta.audit.create_time, a.id()))
        });

        Ok(AuditPage {
            total: matching.len(),
            items: matching.into_iter().skip(offset).take(limit).collect(),
        })
    }

    pub async fn verify(&self, id: RecordId) -> Result<bool, AdminError> {
        let entry = self.get(id)?;
        match self.guard.verify(&entry).await {
            Ok(intact) => Ok(intact),
            Err(IntegrityError::Signing(_)) => Err(AdminError::Unavailable),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryAuditLogStore;
    use keystone_auth::{AllowReason, DenyReason, RoleId};
    use keystone_integrity::LocalHsm;

    fn recorder() -> (AuditRecorder, Arc<InMemoryAuditLogStore>) {
        let store = Arc::new(InMemoryAuditLogStore::new());
        let recorder = AuditRecorder::new(
            store.clone(),
            IntegrityGuard::new(Arc::new(LocalHsm::new("audit"))),
            Arc::new(IdGenerator::new(7)),
        );
        (recorder, store)
    }

    fn meta(user: Option<&str>, url: &str) -> RequestMeta {
        RequestMeta {
            user_id: user.map(str::to_string),
            url: url.to_string(),
            method: "post".to_string(),
            ip_address: Some("10.1.2.3".into()),
            trace_id: Some("t-1".into()),
            ..RequestMeta::default()
        }
    }

    #[tokio::test]
    async fn decisions_become_signed_entries() {
        let (rec, _) = recorder();
        let denied = Decision::Deny {
            role: Some(RoleId::new("42")),
            reason: DenyReason::NoMatch,
        };
        let entry = rec
            .record_decision(&denied, meta(Some("u1"), "/api/user/v1/user-roles/add"))
            .await
            .unwrap();

        assert_eq!(entry.outcome, Outcome::Fail);
        assert_eq!(entry.role_id.as_deref(), Some("42"));
        assert_eq!(entry.request_method, "POST");
        assert_eq!(entry.meta.audit.creator, Some(UserId::new("u1")));
        assert!(entry.meta.integrity.data_signature.is_some());
        assert!(rec.verify(entry.id()).await.unwrap());
    }

    #[tokio::test]
    async fn batch_applies_uniform_defaults() {
        let (rec, _) = recorder();
        let actor = UserId::new("importer");
        let mut stale = AuditLogEntry {
            url: "/a".into(),
            ..AuditLogEntry::default()
        };
        stale.meta.version = 5;
        stale.meta.deleted = true;
        let batch = vec![
            stale,
            AuditLogEntry {
                url: "/b".into(),
                ..AuditLogEntry::default()
            },
        ];

        let stored = rec.record_batch(batch, Some(&actor)).await.unwrap();
        assert_eq!(stored.len(), 2);
        let t = stored[0].meta.audit.create_time;
        for e in &stored {
            assert_eq!(e.version(), 0);
            assert!(!e.is_deleted());
            assert_eq!(e.meta.audit.creator, Some(actor.clone()));
            assert_eq!(e.meta.audit.create_time, t);
        }
        assert_ne!(stored[0].id(), stored[1].id());
    }

    #[tokio::test]
    async fn failed_signing_stores_nothing() {
        let store = Arc::new(InMemoryAuditLogStore::new());
        let rec = AuditRecorder::new(
            store.clone(),
            IntegrityGuard::new(Arc::new(LocalHsm::disabled())),
            Arc::new(IdGenerator::new(1)),
        );
        let err = rec
            .record_decision(&Decision::Unauthenticated, meta(None, "/x"))
            .await
            .unwrap_err();
        assert_eq!(err, AdminError::WriteFailed);
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_paged() {
        let (rec, _) = recorder();
        let allow = Decision::Allow(AllowReason::EmptyUrl);
        for i in 0..5 {
            rec.record_decision(&allow, meta(Some("u1"), &format!("/api/{i}")))
                .await
                .unwrap();
        }
        rec.record_decision(&allow, meta(Some("u2"), "/api/other")).await.unwrap();

        let filter = AuditLogFilter {
            user_id: Some("u1".into()),
            ..AuditLogFilter::default()
        };
        let page = rec.list(&filter, 1, 2).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].url, "/api/3");
        assert_eq!(page.items[1].url, "/api/2");
    }

    #[tokio::test]
    async fn altered_entries_fail_verification() {
        let (rec, store) = recorder();
        let entry = rec
            .record_decision(&Decision::Allow(AllowReason::EmptyUrl), meta(Some("u1"), "/api/x"))
            .await
            .unwrap();

        // Rewrite history underneath the recorder.
        let mut forged = entry.clone();
        forged.outcome = Outcome::Fail;
        let forged_store = Arc::new(InMemoryAuditLogStore::new());
        forged_store.append(vec![forged]).unwrap();
        let auditor = AuditRecorder::new(
            forged_store,
            IntegrityGuard::new(Arc::new(LocalHsm::new("audit"))),
            Arc::new(IdGenerator::new(7)),
        );

        assert!(rec.verify(entry.id()).await.unwrap());
        assert!(!auditor.verify(entry.id()).await.unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }
}
