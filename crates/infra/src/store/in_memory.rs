use std::collections::HashMap;
use std::sync::RwLock;

use keystone_core::{ExpectedVersion, Record, RecordId};

use super::{Clash, RecordStore, StoreError};

#[derive(Debug)]
struct Table<T> {
    rows: HashMap<RecordId, T>,
    order: Vec<RecordId>,
}

/// In-memory record store for tests/dev.
#[derive(Debug)]
pub struct InMemoryRecordStore<T> {
    inner: RwLock<Table<T>>,
}

impl<T> InMemoryRecordStore<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Table {
                rows: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }
}

impl<T> Default for InMemoryRecordStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecordStore<T> for InMemoryRecordStore<T>
where
    T: Record + Clone + Send + Sync,
{
    fn insert(&self, record: T, clash: Option<Clash<'_, T>>) -> Result<(), StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let id = record.id();
        if table.rows.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("record {id} already exists")));
        }
        if let Some(clash) = clash {
            if let Some(existing) = table.rows.values().find(|r| clash(r)) {
                return Err(StoreError::Duplicate(format!(
                    "conflicts with record {}",
                    existing.id()
                )));
            }
        }
        table.order.push(id);
        table.rows.insert(id, record);
        Ok(())
    }

    fn get(&self, id: RecordId) -> Result<Option<T>, StoreError> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(table.rows.get(&id).cloned())
    }

    fn replace_unless(
        &self,
        record: T,
        expected: ExpectedVersion,
        clash: Option<Clash<'_, T>>,
    ) -> Result<(), StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let id = record.id();
        let current = table.rows.get(&id).ok_or(StoreError::NotFound(id))?.version();
        if !expected.matches(current) {
            return Err(StoreError::Conflict(format!(
                "record {id}: expected {expected:?}, found {current}"
            )));
        }
        if let Some(clash) = clash {
            if let Some(existing) = table.rows.values().find(|r| clash(r)) {
                return Err(StoreError::Duplicate(format!(
                    "conflicts with record {}",
                    existing.id()
                )));
            }
        }
        table.rows.insert(id, record);
        Ok(())
    }

    fn list(&self) -> Result<Vec<T>, StoreError> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(table
            .order
            .iter()
            .filter_map(|id| table.rows.get(id).cloned())
            .collect())
    }
}
