use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use tracing::info;

use keystone_core::{Record, RecordId, UserId};
use keystone_rbac::{Role, RoleUrlBinding, UrlBinding};

use super::{AdminError, RecordService};
use crate::store::RecordStore;

/// Role <-> URL edges.
#[derive(Clone)]
pub struct RoleUrlService {
    records: RecordService<RoleUrlBinding>,
    roles: Arc<dyn RecordStore<Role>>,
    urls: Arc<dyn RecordStore<UrlBinding>>,
}

impl RoleUrlService {
    pub fn new(
        records: RecordService<RoleUrlBinding>,
        roles: Arc<dyn RecordStore<Role>>,
        urls: Arc<dyn RecordStore<UrlBinding>>,
    ) -> Self {
        Self { records, roles, urls }
    }

    pub fn records(&self) -> &RecordService<RoleUrlBinding> {
        &self.records
    }

    /// Bind `role_id` to `url_id`, snapshotting the role's current name.
    pub async fn create(
        &self,
        url_id: RecordId,
        role_id: RecordId,
        actor: Option<&UserId>,
    ) -> Result<RoleUrlBinding, AdminError> {
        self.live_url(url_id)?;
        let role = self.live_role(role_id)?;

        let mut edge = RoleUrlBinding::new(url_id, role_id);
        edge.role_name = Some(role.role_name);
        let clash = move |e: &RoleUrlBinding| e.is_live() && e.url_id == url_id && e.role_id == role_id;
        self.records.create_unless(edge, actor, Some(&clash)).await
    }

    pub async fn update(&self, mut edge: RoleUrlBinding, actor: Option<&UserId>) -> Result<RoleUrlBinding, AdminError> {
        self.live_url(edge.url_id)?;
        let role = self.live_role(edge.role_id)?;
        edge.role_name = Some(role.role_name);

        let candidate = edge.clone();
        let clash = |e: &RoleUrlBinding| candidate.duplicates(e);
        self.records
            .update_unless(edge, actor, Some(&clash))
            .await
            .map_err(|e| match e {
                AdminError::Constraint(_) => candidate.already_bound().into(),
                other => other,
            })
    }

    pub async fn remove(&self, id: RecordId, actor: Option<&UserId>) -> Result<RoleUrlBinding, AdminError> {
        self.records.remove(id, actor).await
    }

    pub fn list(&self) -> Result<Vec<RoleUrlBinding>, AdminError> {
        self.records.list()
    }

    /// Make the live roles of `url_id` exactly `role_ids`.
    ///
    /// Missing edges are created, edges to roles outside the set are logically
    /// removed, and matching edges are left untouched. Returns the live edges
    /// of the URL afterwards.
    pub async fn sync_url_roles(
        &self,
        url_id: RecordId,
        role_ids: &[RecordId],
        actor: Option<&UserId>,
    ) -> Result<Vec<RoleUrlBinding>, AdminError> {
        self.live_url(url_id)?;
        let wanted: BTreeSet<RecordId> = role_ids.iter().copied().collect();
        for role_id in &wanted {
            self.live_role(*role_id)?;
        }

        let current = self.records.list_where(|e| e.url_id == url_id)?;
        let present: HashSet<RecordId> = current.iter().map(|e| e.role_id).collect();

        let mut removed = 0;
        for edge in current.iter().filter(|e| !wanted.contains(&e.role_id)) {
            self.records.remove(edge.id(), actor).await?;
            removed += 1;
        }
        let mut added = 0;
        for role_id in wanted.iter().filter(|r| !present.contains(r)) {
            self.create(url_id, *role_id, actor).await?;
            added += 1;
        }

        info!(%url_id, added, removed, "url roles synchronized");
        self.records.list_where(|e| e.url_id == url_id)
    }

    /// Live edges grouped by URL id.
    pub fn roles_for_urls(&self) -> Result<BTreeMap<RecordId, Vec<RoleUrlBinding>>, AdminError> {
        let mut grouped: BTreeMap<RecordId, Vec<RoleUrlBinding>> = BTreeMap::new();
        for edge in self.records.list()? {
            grouped.entry(edge.url_id).or_default().push(edge);
        }
        Ok(grouped)
    }

    /// Live, active URLs bound to `role_id` through live, active edges.
    pub fn urls_for_role(&self, role_id: RecordId) -> Result<Vec<UrlBinding>, AdminError> {
        let url_ids: HashSet<RecordId> = self
            .records
            .list_where(|e| e.role_id == role_id && e.meta.status.is_active())?
            .into_iter()
            .map(|e| e.url_id)
            .collect();

        let mut urls: Vec<UrlBinding> = self
            .urls
            .list()?
            .into_iter()
            .filter(|u| u.is_live() && u.meta.status.is_active() && url_ids.contains(&u.id()))
            .collect();
        urls.sort_by_key(|u| u.id());
        Ok(urls)
    }

    fn live_role(&self, id: RecordId) -> Result<Role, AdminError> {
        match self.roles.get(id)? {
            Some(role) if role.is_live() => Ok(role),
            _ => Err(AdminError::Validation(format!("role {id} does not exist"))),
        }
    }

    fn live_url(&self, id: RecordId) -> Result<UrlBinding, AdminError> {
        match self.urls.get(id)? {
            Some(url) if url.is_live() => Ok(url),
            _ => Err(AdminError::Validation(format!("url {id} does not exist"))),
        }
    }
}
