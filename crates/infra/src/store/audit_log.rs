use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use keystone_core::{Record, RecordId};
use keystone_rbac::AuditLogEntry;

use super::StoreError;

/// Append-only storage for audit entries. Stored entries are never rewritten.
pub trait AuditLogStore: Send + Sync {
    /// Append a batch atomically: either every entry is stored or none is.
    fn append(&self, entries: Vec<AuditLogEntry>) -> Result<(), StoreError>;

    fn get(&self, id: RecordId) -> Result<Option<AuditLogEntry>, StoreError>;

    /// All entries in append order.
    fn list(&self) -> Result<Vec<AuditLogEntry>, StoreError>;
}

impl<S> AuditLogStore for Arc<S>
where
    S: AuditLogStore + ?Sized,
{
    fn append(&self, entries: Vec<AuditLogEntry>) -> Result<(), StoreError> {
        (**self).append(entries)
    }

    fn get(&self, id: RecordId) -> Result<Option<AuditLogEntry>, StoreError> {
        (**self).get(id)
    }

    fn list(&self) -> Result<Vec<AuditLogEntry>, StoreError> {
        (**self).list()
    }
}

#[derive(Debug, Default)]
struct Log {
    entries: Vec<AuditLogEntry>,
    index: HashMap<RecordId, usize>,
}

#[derive(Debug, Default)]
pub struct InMemoryAuditLogStore {
    inner: RwLock<Log>,
}

impl InMemoryAuditLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditLogStore for InMemoryAuditLogStore {
    fn append(&self, entries: Vec<AuditLogEntry>) -> Result<(), StoreError> {
        let mut log = self.inner.write().map_err(|_| StoreError::Poisoned)?;

        let mut batch_ids = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            let id = entry.id();
            if log.index.contains_key(&id) || batch_ids.insert(id, idx).is_some() {
                return Err(StoreError::Duplicate(format!("audit entry {id} already exists")));
            }
        }

        for entry in entries {
            let position = log.entries.len();
            log.index.insert(entry.id(), position);
            log.entries.push(entry);
        }
        Ok(())
    }

    fn get(&self, id: RecordId) -> Result<Option<AuditLogEntry>, StoreError> {
        let log = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(log.index.get(&id).map(|&i| log.entries[i].clone()))
    }

    fn list(&self) -> Result<Vec<AuditLogEntry>, StoreError> {
        let log = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(log.entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64) -> AuditLogEntry {
        let mut e = AuditLogEntry::default();
        e.meta.id = RecordId::from_u64(id);
        e
    }

    #[test]
    fn batches_are_all_or_nothing() {
        let store = InMemoryAuditLogStore::new();
        store.append(vec![entry(1)]).unwrap();

        assert!(store.append(vec![entry(2), entry(1)]).is_err());
        assert!(store.append(vec![entry(3), entry(3)]).is_err());
        assert_eq!(store.list().unwrap().len(), 1);

        store.append(vec![entry(2), entry(3)]).unwrap();
        assert_eq!(store.list().unwrap().len(), 3);
        assert!(store.get(RecordId::from_u64(3)).unwrap().is_some());
    }
}
