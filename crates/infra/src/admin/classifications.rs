use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use keystone_core::{Record, RecordId, UserId};
use keystone_rbac::{build_tree, Classification, ClassificationNode, UrlBinding};

use super::{AdminError, RecordService};
use crate::store::RecordStore;

/// Serializes writes that read and change the classification tree (nodes
/// and the URLs they own), so parent/child checks hold at write time.
pub type TreeLock = Arc<Mutex<()>>;

#[derive(Clone)]
pub struct ClassificationService {
    records: RecordService<Classification>,
    urls: Arc<dyn RecordStore<UrlBinding>>,
    tree: TreeLock,
}

impl ClassificationService {
    pub fn new(
        records: RecordService<Classification>,
        urls: Arc<dyn RecordStore<UrlBinding>>,
        tree: TreeLock,
    ) -> Self {
        Self { records, urls, tree }
    }

    pub fn records(&self) -> &RecordService<Classification> {
        &self.records
    }

    pub async fn create(
        &self,
        classification: Classification,
        actor: Option<&UserId>,
    ) -> Result<Classification, AdminError> {
        classification.validate()?;
        let _tree = self.tree.lock().await;
        self.check_parent(RecordId::ROOT, classification.parent_id)?;
        self.records.create(classification, actor).await
    }

    pub async fn update(
        &self,
        classification: Classification,
        actor: Option<&UserId>,
    ) -> Result<Classification, AdminError> {
        classification.validate()?;
        let _tree = self.tree.lock().await;
        self.check_parent(classification.id(), classification.parent_id)?;
        self.records.update(classification, actor).await
    }

    /// Logical delete; refused while live children or live URLs remain.
    pub async fn remove(&self, id: RecordId, actor: Option<&UserId>) -> Result<Classification, AdminError> {
        let _tree = self.tree.lock().await;
        let children = self.records.list_where(|c| c.parent_id == id)?.len();
        let urls = self
            .urls
            .list()?
            .into_iter()
            .filter(|u| u.is_live() && u.classification_id == id)
            .count();
        Classification::ensure_removable(id, children, urls)?;

        self.records.remove(id, actor).await
    }

    pub fn get(&self, id: RecordId) -> Result<Classification, AdminError> {
        self.records.get(id)
    }

    pub fn list(&self) -> Result<Vec<Classification>, AdminError> {
        self.records.list()
    }

    pub fn tree(&self) -> Result<Vec<ClassificationNode>, AdminError> {
        Ok(build_tree(self.records.list()?, self.urls.list()?))
    }

    /// The parent must be live, and `id` must not appear on its ancestor chain.
    fn check_parent(&self, id: RecordId, parent: RecordId) -> Result<(), AdminError> {
        let mut seen = HashSet::new();
        let mut cursor = parent;
        while !cursor.is_root() {
            if cursor == id || !seen.insert(cursor) {
                return Err(AdminError::Validation(format!(
                    "classification {id} cannot be moved under its own descendant"
                )));
            }
            let node = self
                .records
                .get(cursor)
                .map_err(|_| AdminError::Validation(format!("parent classification {cursor} does not exist")))?;
            cursor = node.parent_id;
        }
        Ok(())
    }
}
