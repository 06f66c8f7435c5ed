use std::sync::Arc;

use keystone_core::{Record, RecordId, UserId};
use keystone_rbac::{Classification, UrlBinding};

use super::classifications::TreeLock;
use super::{AdminError, RecordService};
use crate::store::RecordStore;

/// Controllable endpoints, each owned by a classification.
#[derive(Clone)]
pub struct ClassificationUrlService {
    records: RecordService<UrlBinding>,
    classifications: Arc<dyn RecordStore<Classification>>,
    tree: TreeLock,
}

/// Any store-level clash on a URL write is a duplicate endpoint.
fn registered_concurrently(url: &UrlBinding, err: AdminError) -> AdminError {
    match err {
        AdminError::Constraint(_) => url.already_registered().into(),
        other => other,
    }
}

impl ClassificationUrlService {
    pub fn new(
        records: RecordService<UrlBinding>,
        classifications: Arc<dyn RecordStore<Classification>>,
        tree: TreeLock,
    ) -> Self {
        Self {
            records,
            classifications,
            tree,
        }
    }

    pub fn records(&self) -> &RecordService<UrlBinding> {
        &self.records
    }

    pub async fn create(&self, mut url: UrlBinding, actor: Option<&UserId>) -> Result<UrlBinding, AdminError> {
        url.normalize();
        url.validate()?;
        let _tree = self.tree.lock().await;
        self.check_owner(url.classification_id)?;

        let candidate = url.clone();
        let clash = |existing: &UrlBinding| {
            existing.is_live() && existing.url == candidate.url && existing.method == candidate.method
        };
        self.records
            .create_unless(url, actor, Some(&clash))
            .await
            .map_err(|e| registered_concurrently(&candidate, e))
    }

    pub async fn update(&self, mut url: UrlBinding, actor: Option<&UserId>) -> Result<UrlBinding, AdminError> {
        url.normalize();
        url.validate()?;
        let _tree = self.tree.lock().await;
        self.check_owner(url.classification_id)?;

        let candidate = url.clone();
        let clash = |existing: &UrlBinding| candidate.duplicates(existing);
        self.records
            .update_unless(url, actor, Some(&clash))
            .await
            .map_err(|e| registered_concurrently(&candidate, e))
    }

    pub async fn remove(&self, id: RecordId, actor: Option<&UserId>) -> Result<UrlBinding, AdminError> {
        self.records.remove(id, actor).await
    }

    pub fn get(&self, id: RecordId) -> Result<UrlBinding, AdminError> {
        self.records.get(id)
    }

    /// Live URLs, optionally restricted to one classification.
    pub fn list(&self, classification_id: Option<RecordId>) -> Result<Vec<UrlBinding>, AdminError> {
        self.records
            .list_where(|u| classification_id.is_none_or(|c| u.classification_id == c))
    }

    /// Id of the live, active binding registered for exactly `url`.
    pub fn url_id_by_url(&self, url: &str) -> Result<Option<RecordId>, AdminError> {
        let url = url.trim();
        Ok(self
            .records
            .list_where(|u| u.meta.status.is_active() && u.url == url)?
            .first()
            .map(Record::id))
    }

    fn check_owner(&self, classification_id: RecordId) -> Result<(), AdminError> {
        match self.classifications.get(classification_id)? {
            Some(c) if c.is_live() => Ok(()),
            _ => Err(AdminError::Validation(format!(
                "classification {classification_id} does not exist"
            ))),
        }
    }
}
