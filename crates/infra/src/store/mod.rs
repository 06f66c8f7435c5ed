//! Record persistence ports and their in-memory implementations.

pub mod audit_log;
pub mod in_memory;

use std::sync::Arc;

use thiserror::Error;

use keystone_core::{ExpectedVersion, RecordId};

pub use audit_log::{AuditLogStore, InMemoryAuditLogStore};
pub use in_memory::InMemoryRecordStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("concurrency conflict: {0}")]
    Conflict(String),

    #[error("record {0} not found")]
    NotFound(RecordId),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Predicate over stored records used to reject a write atomically.
pub type Clash<'a, T> = &'a (dyn Fn(&T) -> bool + Send + Sync);

/// Keyed, versioned record storage.
///
/// Records are never physically removed; logical deletion is an ordinary
/// `replace`. Every write is a single atomic step: validation predicates and
/// version checks run under the same lock as the write itself.
pub trait RecordStore<T>: Send + Sync {
    /// Insert a new record. Fails with `Duplicate` if the id exists or if any
    /// stored record satisfies `clash`.
    fn insert(&self, record: T, clash: Option<Clash<'_, T>>) -> Result<(), StoreError>;

    fn get(&self, id: RecordId) -> Result<Option<T>, StoreError>;

    /// Compare-and-swap: replace the stored record only if its current
    /// version matches `expected`.
    fn replace(&self, record: T, expected: ExpectedVersion) -> Result<(), StoreError> {
        self.replace_unless(record, expected, None)
    }

    /// Compare-and-swap that also fails with `Duplicate` if any stored
    /// record satisfies `clash`, checked under the same lock as the version.
    fn replace_unless(
        &self,
        record: T,
        expected: ExpectedVersion,
        clash: Option<Clash<'_, T>>,
    ) -> Result<(), StoreError>;

    /// All records, deleted ones included, in insertion order.
    fn list(&self) -> Result<Vec<T>, StoreError>;
}

impl<T, S> RecordStore<T> for Arc<S>
where
    S: RecordStore<T> + ?Sized,
{
    fn insert(&self, record: T, clash: Option<Clash<'_, T>>) -> Result<(), StoreError> {
        (**self).insert(record, clash)
    }

    fn get(&self, id: RecordId) -> Result<Option<T>, StoreError> {
        (**self).get(id)
    }

    fn replace_unless(
        &self,
        record: T,
        expected: ExpectedVersion,
        clash: Option<Clash<'_, T>>,
    ) -> Result<(), StoreError> {
        (**self).replace_unless(record, expected, clash)
    }

    fn list(&self) -> Result<Vec<T>, StoreError> {
        (**self).list()
    }
}
