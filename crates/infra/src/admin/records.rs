use std::sync::Arc;

use tracing::{debug, error};

use keystone_core::{utc_now_millis, AuditFields, ExpectedVersion, Record, RecordId, RecordStatus, UserId};
use keystone_integrity::{IntegrityError, IntegrityGuard, Signable};

use super::AdminError;
use crate::ids::IdGenerator;
use crate::store::{Clash, RecordStore};

/// Generic create / update / remove pipeline for one record type.
///
/// Writes are stamped last: every field change of the write (ids, audit
/// fields, version bump, logical deletion) happens before hashing and
/// signing, and the signed record is persisted with a compare-and-swap on
/// the version it was derived from. A signing failure aborts the write.
pub struct RecordService<T> {
    kind: &'static str,
    store: Arc<dyn RecordStore<T>>,
    guard: IntegrityGuard,
    ids: Arc<IdGenerator>,
}

impl<T> Clone for RecordService<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            store: self.store.clone(),
            guard: self.guard.clone(),
            ids: self.ids.clone(),
        }
    }
}

impl<T> RecordService<T>
where
    T: Signable + Clone + Send + Sync + 'static,
{
    pub fn new(
        kind: &'static str,
        store: Arc<dyn RecordStore<T>>,
        guard: IntegrityGuard,
        ids: Arc<IdGenerator>,
    ) -> Self {
        Self {
            kind,
            store,
            guard,
            ids,
        }
    }

    pub async fn create(&self, record: T, actor: Option<&UserId>) -> Result<T, AdminError> {
        self.create_unless(record, actor, None).await
    }

    /// Create, rejecting atomically if any stored record satisfies `clash`.
    pub async fn create_unless(
        &self,
        mut record: T,
        actor: Option<&UserId>,
        clash: Option<Clash<'_, T>>,
    ) -> Result<T, AdminError> {
        record.set_id(self.ids.next_id());
        record.set_version(0);
        record.set_status(RecordStatus::Active);
        record.set_deleted(false);
        *record.audit_mut() = AuditFields::default();
        record.audit_mut().created(actor, utc_now_millis());

        self.sign(&mut record, "create").await?;
        self.store.insert(record.clone(), clash)?;
        debug!(kind = self.kind, id = %record.id(), "record created");
        Ok(record)
    }

    /// Apply a client-submitted record over the stored one.
    ///
    /// `record.version()` must equal the stored version. Identity, creation
    /// audit and deletion state always come from the stored record. A stored
    /// record that fails its integrity check is never rewritten.
    pub async fn update(&self, record: T, actor: Option<&UserId>) -> Result<T, AdminError> {
        self.update_unless(record, actor, None).await
    }

    /// Update, rejecting atomically if any stored record satisfies `clash`
    /// at the moment of the write.
    pub async fn update_unless(
        &self,
        mut record: T,
        actor: Option<&UserId>,
        clash: Option<Clash<'_, T>>,
    ) -> Result<T, AdminError> {
        let stored = self.get(record.id())?;
        self.guard.ensure_intact(&stored).await?;
        ExpectedVersion::Exact(record.version()).check(stored.version())?;
        record.set_deleted(stored.is_deleted());
        self.write(record, &stored, actor, "update", clash).await
    }

    /// Logical delete.
    pub async fn remove(&self, id: RecordId, actor: Option<&UserId>) -> Result<T, AdminError> {
        let stored = self.get(id)?;
        self.guard.ensure_intact(&stored).await?;
        let mut record = stored.clone();
        record.mark_deleted();
        self.write(record, &stored, actor, "remove", None).await
    }

    async fn write(
        &self,
        mut record: T,
        stored: &T,
        actor: Option<&UserId>,
        operation: &'static str,
        clash: Option<Clash<'_, T>>,
    ) -> Result<T, AdminError> {
        let current = stored.version();
        *record.audit_mut() = stored.audit().clone();
        record.audit_mut().updated(actor, utc_now_millis());
        record.set_version(current + 1);

        self.sign(&mut record, operation).await?;
        self.store
            .replace_unless(record.clone(), ExpectedVersion::Exact(current), clash)?;
        debug!(kind = self.kind, id = %record.id(), operation, version = record.version(), "record written");
        Ok(record)
    }

    async fn sign(&self, record: &mut T, operation: &'static str) -> Result<(), AdminError> {
        let id = record.id();
        self.guard.sign(record).await.map_err(|e| {
            error!(kind = self.kind, %id, operation, "signing failed; write aborted");
            AdminError::from(e)
        })
    }

    /// A live record.
    pub fn get(&self, id: RecordId) -> Result<T, AdminError> {
        self.find(id)?
            .filter(Record::is_live)
            .ok_or_else(|| AdminError::not_found(self.kind, id))
    }

    /// Any stored record, deleted ones included.
    pub fn find(&self, id: RecordId) -> Result<Option<T>, AdminError> {
        Ok(self.store.get(id)?)
    }

    /// Live records ordered by creation time.
    pub fn list(&self) -> Result<Vec<T>, AdminError> {
        self.list_where(|_| true)
    }

    pub fn list_where<F>(&self, keep: F) -> Result<Vec<T>, AdminError>
    where
        F: Fn(&T) -> bool,
    {
        let mut records: Vec<T> = self
            .store
            .list()?
            .into_iter()
            .filter(|r| r.is_live() && keep(r))
            .collect();
        records.sort_by_key(|r| (r.audit().create_time, r.id()));
        Ok(records)
    }

    /// Re-check a stored record (deleted or not) against its stamp.
    pub async fn verify(&self, id: RecordId) -> Result<bool, AdminError> {
        let record = self
            .find(id)?
            .ok_or_else(|| AdminError::not_found(self.kind, id))?;
        match self.guard.verify(&record).await {
            Ok(intact) => Ok(intact),
            Err(IntegrityError::Signing(_)) => Err(AdminError::Unavailable),
            Err(e) => Err(e.into()),
        }
    }

    /// Load a record, failing with `IntegrityViolation` if it was tampered with.
    pub async fn load_verified(&self, id: RecordId) -> Result<T, AdminError> {
        let record = self.get(id)?;
        match self.guard.ensure_intact(&record).await {
            Ok(()) => Ok(record),
            Err(IntegrityError::Signing(_)) => Err(AdminError::Unavailable),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;
    use keystone_integrity::{HsmClient, LocalHsm, ViolationKind};
    use keystone_rbac::RoleUrlBinding;

    fn service_with(hsm: Arc<dyn HsmClient>) -> (RecordService<RoleUrlBinding>, Arc<InMemoryRecordStore<RoleUrlBinding>>) {
        let store = Arc::new(InMemoryRecordStore::new());
        let svc = RecordService::new(
            "role_url",
            store.clone(),
            IntegrityGuard::new(hsm).with_public_key_id("pk-1"),
            Arc::new(IdGenerator::new(1)),
        );
        (svc, store)
    }

    fn service() -> (RecordService<RoleUrlBinding>, Arc<InMemoryRecordStore<RoleUrlBinding>>) {
        service_with(Arc::new(LocalHsm::new("test")))
    }

    fn edge() -> RoleUrlBinding {
        RoleUrlBinding::new(RecordId::from_u64(10), RecordId::from_u64(20))
    }

    #[tokio::test]
    async fn create_applies_defaults_and_signs() {
        let (svc, _) = service();
        let admin = UserId::new("admin");
        let mut input = edge();
        input.meta.version = 9;
        input.meta.deleted = true;

        let created = svc.create(input, Some(&admin)).await.unwrap();
        assert_ne!(created.id(), RecordId::ROOT);
        assert_eq!(created.version(), 0);
        assert!(created.is_live());
        assert_eq!(created.audit().creator, Some(admin));
        assert!(created.meta.audit.create_time > 0);
        assert_eq!(created.meta.integrity.business_no, Some(created.id()));
        assert!(svc.verify(created.id()).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_updates_from_same_version_one_wins() {
        let (svc, _) = service();
        let created = svc.create(edge(), None).await.unwrap();

        let mut a = created.clone();
        a.role_name = Some("a".into());
        let mut b = created.clone();
        b.role_name = Some("b".into());

        let (ra, rb) = tokio::join!(svc.update(a, None), svc.update(b, None));
        let wins = [ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(wins, 1);
        let loser = if ra.is_ok() { rb } else { ra };
        assert!(matches!(loser, Err(AdminError::Conflict(_))));

        let stored = svc.get(created.id()).unwrap();
        assert_eq!(stored.version(), 1);
        assert!(svc.verify(stored.id()).await.unwrap());
    }

    #[tokio::test]
    async fn remove_is_logical_and_resigned() {
        let (svc, store) = service();
        let created = svc.create(edge(), None).await.unwrap();
        let removed = svc.remove(created.id(), Some(&UserId::new("ops"))).await.unwrap();

        assert!(removed.is_deleted());
        assert_eq!(removed.version(), 1);
        assert!(matches!(svc.get(created.id()), Err(AdminError::NotFound(_))));
        assert!(store.get(created.id()).unwrap().is_some());
        assert!(svc.verify(created.id()).await.unwrap());
        assert!(svc.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tampering_in_storage_is_reported() {
        let (svc, store) = service();
        let created = svc.create(edge(), None).await.unwrap();

        let mut tampered = created.clone();
        tampered.role_id = RecordId::from_u64(999);
        store.replace(tampered, ExpectedVersion::Any).unwrap();

        assert!(!svc.verify(created.id()).await.unwrap());
        assert!(matches!(
            svc.load_verified(created.id()).await,
            Err(AdminError::IntegrityViolation { kind: ViolationKind::HashMismatch, .. })
        ));

        // Not silently re-signed by a later write.
        let stored = store.get(created.id()).unwrap().unwrap();
        assert!(matches!(
            svc.update(stored, None).await,
            Err(AdminError::IntegrityViolation { .. })
        ));
        assert!(matches!(
            svc.remove(created.id(), None).await,
            Err(AdminError::IntegrityViolation { .. })
        ));
    }

    #[tokio::test]
    async fn signing_failure_aborts_the_write() {
        let (svc, store) = service_with(Arc::new(LocalHsm::disabled()));
        assert_eq!(svc.create(edge(), None).await.unwrap_err(), AdminError::WriteFailed);
        assert!(store.list().unwrap().is_empty());

        let (ok_svc, shared) = service();
        let created = ok_svc.create(edge(), None).await.unwrap();
        let broken: RecordService<RoleUrlBinding> = RecordService::new(
            "role_url",
            shared.clone(),
            IntegrityGuard::new(Arc::new(LocalHsm::disabled())),
            Arc::new(IdGenerator::new(2)),
        );

        let mut changed = created.clone();
        changed.role_name = Some("changed".into());
        assert_eq!(broken.update(changed, None).await.unwrap_err(), AdminError::WriteFailed);
        assert_eq!(shared.get(created.id()).unwrap(), Some(created));
    }
}
