//! Admin services over the signable records.
//!
//! Every write goes through [`RecordService`]: creation defaults, audit
//! stamps, optimistic locking and integrity signing happen in one place.

pub mod classification_urls;
pub mod classifications;
pub mod records;
pub mod role_urls;
pub mod roles;
pub mod user_roles;

use std::sync::Arc;

use thiserror::Error;
use tracing::error;

use keystone_core::{DomainError, RecordId};
use keystone_integrity::{IntegrityError, IntegrityGuard, ViolationKind};
use keystone_rbac::{Classification, Role, RoleUrlBinding, UrlBinding, UserRoleBinding};

use crate::ids::IdGenerator;
use crate::store::{InMemoryRecordStore, RecordStore, StoreError};

pub use classification_urls::ClassificationUrlService;
pub use classifications::{ClassificationService, TreeLock};
pub use records::RecordService;
pub use role_urls::RoleUrlService;
pub use roles::RoleService;
pub use user_roles::UserRoleService;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdminError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// A business rule rejected the write (e.g. user already bound).
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Stale version.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Signing failed; the write was aborted. Carries no HSM detail.
    #[error("write failed")]
    WriteFailed,

    /// The HSM could not be reached to check a record.
    #[error("integrity service unavailable")]
    Unavailable,

    #[error("integrity violation on record {record}: {kind}")]
    IntegrityViolation { record: RecordId, kind: ViolationKind },

    #[error("store error: {0}")]
    Store(StoreError),
}

impl AdminError {
    pub fn not_found(what: &str, id: RecordId) -> Self {
        Self::NotFound(format!("{what} {id}"))
    }
}

impl From<DomainError> for AdminError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => AdminError::Validation(msg),
            DomainError::ConstraintViolation(msg) => AdminError::Constraint(msg),
            DomainError::Conflict(msg) => AdminError::Conflict(msg),
        }
    }
}

impl From<StoreError> for AdminError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Duplicate(msg) => AdminError::Constraint(msg),
            StoreError::Conflict(msg) => AdminError::Conflict(msg),
            StoreError::NotFound(id) => AdminError::not_found("record", id),
            StoreError::Poisoned => AdminError::Store(value),
        }
    }
}

impl From<IntegrityError> for AdminError {
    fn from(value: IntegrityError) -> Self {
        match value {
            IntegrityError::Signing(_) => AdminError::WriteFailed,
            IntegrityError::Violation { record, kind } => {
                error!(%record, %kind, "integrity violation detected");
                AdminError::IntegrityViolation { record, kind }
            }
        }
    }
}

/// The full set of admin services over one set of stores.
#[derive(Clone)]
pub struct AdminServices {
    pub roles: RoleService,
    pub classifications: ClassificationService,
    pub classification_urls: ClassificationUrlService,
    pub role_urls: RoleUrlService,
    pub user_roles: UserRoleService,
}

impl AdminServices {
    pub fn new(
        roles: Arc<dyn RecordStore<Role>>,
        classifications: Arc<dyn RecordStore<Classification>>,
        urls: Arc<dyn RecordStore<UrlBinding>>,
        role_urls: Arc<dyn RecordStore<RoleUrlBinding>>,
        user_roles: Arc<dyn RecordStore<UserRoleBinding>>,
        guard: IntegrityGuard,
        ids: Arc<IdGenerator>,
    ) -> Self {
        let role_records = RecordService::new("role", roles.clone(), guard.clone(), ids.clone());
        let classification_records =
            RecordService::new("classification", classifications.clone(), guard.clone(), ids.clone());
        let url_records = RecordService::new("classification_url", urls.clone(), guard.clone(), ids.clone());
        let role_url_records = RecordService::new("role_url", role_urls, guard.clone(), ids.clone());
        let user_role_records = RecordService::new("user_role", user_roles, guard, ids);
        let tree: TreeLock = Arc::default();

        Self {
            roles: RoleService::new(role_records),
            classifications: ClassificationService::new(
                classification_records,
                urls.clone(),
                tree.clone(),
            ),
            classification_urls: ClassificationUrlService::new(url_records, classifications, tree),
            role_urls: RoleUrlService::new(role_url_records, roles.clone(), urls),
            user_roles: UserRoleService::new(user_role_records, roles),
        }
    }

    /// Services over fresh in-memory stores.
    pub fn in_memory(guard: IntegrityGuard, ids: Arc<IdGenerator>) -> Self {
        Self::new(
            Arc::new(InMemoryRecordStore::<Role>::new()),
            Arc::new(InMemoryRecordStore::<Classification>::new()),
            Arc::new(InMemoryRecordStore::<UrlBinding>::new()),
            Arc::new(InMemoryRecordStore::<RoleUrlBinding>::new()),
            Arc::new(InMemoryRecordStore::<UserRoleBinding>::new()),
            guard,
            ids,
        )
    }
}
