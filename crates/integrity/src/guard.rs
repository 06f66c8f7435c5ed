//! Hash + sign on write, recompute + verify on read.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::canonical::{sha256_hex, Canonical};
use crate::error::{IntegrityError, ViolationKind};
use crate::hsm::{HsmClient, HsmError};
use crate::stamp::{Signable, SIGN_ALGORITHM};

/// Stamps records with a content hash and HSM signature before persistence.
///
/// Signing is all-or-nothing: if the HSM fails, the record is left untouched
/// and the caller must abort its write. There is no retry here; retries are
/// the HSM client's business.
#[derive(Clone)]
pub struct IntegrityGuard {
    hsm: Arc<dyn HsmClient>,
    public_key_id: Option<String>,
}

impl IntegrityGuard {
    pub fn new(hsm: Arc<dyn HsmClient>) -> Self {
        Self {
            hsm,
            public_key_id: None,
        }
    }

    pub fn with_public_key_id(mut self, public_key_id: impl Into<String>) -> Self {
        self.public_key_id = Some(public_key_id.into());
        self
    }

    pub fn hsm(&self) -> &Arc<dyn HsmClient> {
        &self.hsm
    }

    /// `id|fields..|version|status|deleted`: the hashed content.
    pub fn hash_content<T: Signable>(record: &T) -> String {
        Self::with_business_fields(record)
            .display(record.version())
            .display(record.status_code())
            .display(u8::from(record.is_deleted()))
            .finish()
    }

    /// `id|fields..|effective_time`: the content handed to the HSM.
    pub fn sign_content<T: Signable>(record: &T) -> String {
        Self::with_business_fields(record)
            .display(record.audit().effective_time())
            .finish()
    }

    fn with_business_fields<T: Signable>(record: &T) -> Canonical {
        record
            .business_fields()
            .iter()
            .fold(Canonical::new().display(record.id()), |c, field| {
                c.field(field.as_deref())
            })
    }

    pub fn hash<T: Signable>(record: &T) -> String {
        sha256_hex(&Self::hash_content(record))
    }

    /// Compute hash and signature and write them onto `record`.
    ///
    /// Must run after every other field mutation of the write, including
    /// version bump, audit stamps and logical deletion.
    pub async fn sign<T: Signable>(&self, record: &mut T) -> Result<(), IntegrityError> {
        let data_hash = Self::hash(record);
        let content = Self::sign_content(record);

        let signature = self.hsm.sign(content.as_bytes()).await.map_err(|e| {
            warn!(record = %record.id(), error = %e, "hsm signing failed");
            IntegrityError::Signing(e.to_string())
        })?;

        let signed_at = record.audit().effective_time();
        let business_no = record.id();
        let stamp = record.stamp_mut();
        stamp.business_no = Some(business_no);
        stamp.data_hash = Some(data_hash);
        stamp.data_signature = Some(signature);
        stamp.public_key_id = self.public_key_id.clone();
        stamp.sign_algorithm = Some(SIGN_ALGORITHM.to_string());
        stamp.last_sign_time = Some(signed_at);

        debug!(record = %record.id(), "record signed");
        Ok(())
    }

    /// Check the stored hash and signature against a fresh recomputation.
    ///
    /// Returns a [`IntegrityError::Violation`] naming what failed. A signature
    /// the HSM cannot even parse counts as invalid; an unreachable HSM is a
    /// [`IntegrityError::Signing`] failure.
    pub async fn ensure_intact<T: Signable>(&self, record: &T) -> Result<(), IntegrityError> {
        let violation = |kind| IntegrityError::Violation {
            record: record.id(),
            kind,
        };

        let stamp = record.stamp();
        let (Some(stored_hash), Some(signature)) = (&stamp.data_hash, &stamp.data_signature) else {
            return Err(violation(ViolationKind::Unsigned));
        };

        if *stored_hash != Self::hash(record) {
            return Err(violation(ViolationKind::HashMismatch));
        }

        let content = Self::sign_content(record);
        match self.hsm.verify(content.as_bytes(), signature).await {
            Ok(true) => Ok(()),
            Ok(false) | Err(HsmError::InvalidInput(_)) => {
                Err(violation(ViolationKind::SignatureInvalid))
            }
            Err(e) => Err(IntegrityError::Signing(e.to_string())),
        }
    }

    /// `true` iff the record is intact; HSM outages still surface as errors.
    pub async fn verify<T: Signable>(&self, record: &T) -> Result<bool, IntegrityError> {
        match self.ensure_intact(record).await {
            Ok(()) => Ok(true),
            Err(IntegrityError::Violation { record, kind }) => {
                warn!(%record, %kind, "integrity verification failed");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

impl core::fmt::Debug for IntegrityGuard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IntegrityGuard")
            .field("public_key_id", &self.public_key_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalHsm;
    use crate::stamp::IntegrityStamp;
    use async_trait::async_trait;
    use keystone_core::{AuditFields, Record, RecordId, RecordStatus};
    use proptest::prelude::*;

    #[derive(Debug, Clone, Default)]
    struct Note {
        id: RecordId,
        title: Option<String>,
        owner: Option<String>,
        version: u64,
        deleted: bool,
        audit: AuditFields,
        stamp: IntegrityStamp,
    }

    impl Record for Note {
        fn id(&self) -> RecordId {
            self.id
        }
        fn set_id(&mut self, id: RecordId) {
            self.id = id;
        }
        fn version(&self) -> u64 {
            self.version
        }
        fn set_version(&mut self, version: u64) {
            self.version = version;
        }
        fn status(&self) -> RecordStatus {
            RecordStatus::Active
        }
        fn set_status(&mut self, _: RecordStatus) {}
        fn is_deleted(&self) -> bool {
            self.deleted
        }
        fn set_deleted(&mut self, deleted: bool) {
            self.deleted = deleted;
        }
        fn audit(&self) -> &AuditFields {
            &self.audit
        }
        fn audit_mut(&mut self) -> &mut AuditFields {
            &mut self.audit
        }
    }

    impl Signable for Note {
        fn business_fields(&self) -> Vec<Option<String>> {
            vec![self.title.clone(), self.owner.clone()]
        }
        fn stamp(&self) -> &IntegrityStamp {
            &self.stamp
        }
        fn stamp_mut(&mut self) -> &mut IntegrityStamp {
            &mut self.stamp
        }
    }

    fn note(id: u64, title: &str) -> Note {
        let mut audit = AuditFields::default();
        audit.create_time = 1_700_000_000_000;
        Note {
            id: RecordId::from_u64(id),
            title: Some(title.to_string()),
            owner: None,
            audit,
            ..Note::default()
        }
    }

    fn guard() -> IntegrityGuard {
        IntegrityGuard::new(Arc::new(LocalHsm::new("test-secret"))).with_public_key_id("pk-1")
    }

    struct BrokenHsm;

    #[async_trait]
    impl HsmClient for BrokenHsm {
        async fn sign(&self, _: &[u8]) -> Result<String, HsmError> {
            Err(HsmError::Unavailable("connection refused".into()))
        }
        async fn verify(&self, _: &[u8], _: &str) -> Result<bool, HsmError> {
            Err(HsmError::Unavailable("connection refused".into()))
        }
        async fn encrypt(&self, _: &[u8]) -> Result<String, HsmError> {
            Err(HsmError::Unavailable("connection refused".into()))
        }
        async fn decrypt(&self, _: &str) -> Result<Vec<u8>, HsmError> {
            Err(HsmError::Unavailable("connection refused".into()))
        }
    }

    #[test]
    fn canonical_content_layout() {
        let mut n = note(42, "admin");
        n.version = 3;
        assert_eq!(IntegrityGuard::hash_content(&n), "42|admin||3|1|0");
        assert_eq!(IntegrityGuard::sign_content(&n), "42|admin||1700000000000");

        n.audit.update_time = Some(1_700_000_000_500);
        n.mark_deleted();
        assert_eq!(IntegrityGuard::hash_content(&n), "42|admin||3|1|1");
        assert_eq!(IntegrityGuard::sign_content(&n), "42|admin||1700000000500");
    }

    #[tokio::test]
    async fn sign_stamps_every_integrity_field() {
        let mut n = note(7, "ops");
        guard().sign(&mut n).await.unwrap();

        assert_eq!(n.stamp.business_no, Some(RecordId::from_u64(7)));
        assert_eq!(n.stamp.data_hash.as_deref(), Some(IntegrityGuard::hash(&n).as_str()));
        assert_eq!(n.stamp.sign_algorithm.as_deref(), Some(SIGN_ALGORITHM));
        assert_eq!(n.stamp.public_key_id.as_deref(), Some("pk-1"));
        assert_eq!(n.stamp.last_sign_time, Some(1_700_000_000_000));
        assert!(guard().verify(&n).await.unwrap());
    }

    #[tokio::test]
    async fn hsm_failure_leaves_record_unsigned() {
        let mut n = note(7, "ops");
        let err = IntegrityGuard::new(Arc::new(BrokenHsm))
            .sign(&mut n)
            .await
            .unwrap_err();

        assert!(matches!(err, IntegrityError::Signing(_)));
        assert_eq!(n.stamp, IntegrityStamp::default());
    }

    #[tokio::test]
    async fn unsigned_and_garbled_records_are_violations() {
        let g = guard();
        let mut n = note(9, "x");
        assert!(matches!(
            g.ensure_intact(&n).await,
            Err(IntegrityError::Violation { kind: ViolationKind::Unsigned, .. })
        ));

        g.sign(&mut n).await.unwrap();
        n.stamp.data_signature = Some("***".into());
        assert!(matches!(
            g.ensure_intact(&n).await,
            Err(IntegrityError::Violation { kind: ViolationKind::SignatureInvalid, .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_hsm_on_verify_is_not_a_violation() {
        let mut n = note(9, "x");
        guard().sign(&mut n).await.unwrap();
        let g = IntegrityGuard::new(Arc::new(BrokenHsm));
        assert!(matches!(g.verify(&n).await, Err(IntegrityError::Signing(_))));
    }

    fn block_on<F: core::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(f)
    }

    proptest! {
        #[test]
        fn any_business_field_change_is_detected(
            title in "[a-z]{1,12}",
            tampered in "[A-Z]{1,12}",
        ) {
            let g = guard();
            let mut n = note(11, &title);
            block_on(g.sign(&mut n)).unwrap();
            prop_assert!(block_on(g.verify(&n)).unwrap());

            n.title = Some(tampered);
            let detected = matches!(
                block_on(g.ensure_intact(&n)),
                Err(IntegrityError::Violation { kind: ViolationKind::HashMismatch, .. })
            );
            prop_assert!(detected);
        }

        #[test]
        fn stale_version_is_detected(bump in 1u64..1_000) {
            let g = guard();
            let mut n = note(12, "t");
            block_on(g.sign(&mut n)).unwrap();
            n.version += bump;
            prop_assert!(!block_on(g.verify(&n)).unwrap());
        }
    }
}
