//! URL classifications: a presentation tree grouping controllable endpoints.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use keystone_core::{DomainError, DomainResult, Record, RecordId};

use crate::meta::RecordMeta;

/// A node in the classification tree. Top-level nodes have parent [`RecordId::ROOT`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub parent_id: RecordId,
    pub classification_name: String,
}

impl Classification {
    pub fn new(parent_id: RecordId, name: impl Into<String>) -> Self {
        Self {
            parent_id,
            classification_name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.classification_name.trim().is_empty() {
            return Err(DomainError::validation("classification name cannot be blank"));
        }
        if self.parent_id == self.meta.id && !self.parent_id.is_root() {
            return Err(DomainError::validation("classification cannot be its own parent"));
        }
        Ok(())
    }

    /// Removal is refused while live children or live URLs remain.
    pub fn ensure_removable(id: RecordId, live_children: usize, live_urls: usize) -> DomainResult<()> {
        if live_children > 0 {
            return Err(DomainError::constraint(format!(
                "classification {id} still has {live_children} child classification(s)"
            )));
        }
        if live_urls > 0 {
            return Err(DomainError::constraint(format!(
                "classification {id} still owns {live_urls} url(s)"
            )));
        }
        Ok(())
    }
}

signable_record!(Classification => |c| vec![
    Some(c.parent_id.to_string()),
    Some(c.classification_name.clone()),
]);

/// One controllable endpoint ("classification URL").
///
/// `method` is optional; when present it is stored upper-cased and the grant
/// only applies to that HTTP method.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlBinding {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub classification_id: RecordId,
    pub url: String,
    #[serde(rename = "methodType", default)]
    pub method: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl UrlBinding {
    pub fn new(classification_id: RecordId, url: impl Into<String>) -> Self {
        Self {
            classification_id,
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.normalize();
        self
    }

    /// Trim the URL, upper-case the method, and drop a blank method.
    pub fn normalize(&mut self) {
        self.url = self.url.trim().to_string();
        self.method = self
            .method
            .take()
            .map(|m| m.trim().to_ascii_uppercase())
            .filter(|m| !m.is_empty());
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.url.trim().is_empty() {
            return Err(DomainError::validation("url cannot be blank"));
        }
        if self.classification_id.is_root() {
            return Err(DomainError::validation("url must belong to a classification"));
        }
        Ok(())
    }

    /// A different live binding registered for the same URL and method.
    pub fn duplicates(&self, other: &UrlBinding) -> bool {
        other.meta.id != self.meta.id
            && other.is_live()
            && other.url == self.url
            && other.method == self.method
    }

    pub fn already_registered(&self) -> DomainError {
        DomainError::constraint(format!("url {} is already registered", self.url))
    }
}

signable_record!(UrlBinding => |u| vec![
    Some(u.classification_id.to_string()),
    Some(u.url.clone()),
    u.method.clone(),
]);

/// A classification with its live URLs and child nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationNode {
    #[serde(flatten)]
    pub classification: Classification,
    pub urls: Vec<UrlBinding>,
    pub children: Vec<ClassificationNode>,
}

/// Assemble the classification forest from flat lists.
///
/// Deleted records are skipped. Nodes whose parent is missing are treated as
/// roots; cycles are cut at the first repeated node. Siblings keep creation
/// order.
pub fn build_tree(
    classifications: Vec<Classification>,
    urls: Vec<UrlBinding>,
) -> Vec<ClassificationNode> {
    let live: Vec<Classification> = classifications.into_iter().filter(|c| c.is_live()).collect();
    let ids: HashSet<RecordId> = live.iter().map(|c| c.meta.id).collect();

    let mut urls_by_owner: HashMap<RecordId, Vec<UrlBinding>> = HashMap::new();
    for url in urls.into_iter().filter(|u| u.is_live()) {
        urls_by_owner.entry(url.classification_id).or_default().push(url);
    }

    let mut children: HashMap<RecordId, Vec<Classification>> = HashMap::new();
    let mut roots = Vec::new();
    for c in live {
        if c.parent_id.is_root() || !ids.contains(&c.parent_id) {
            roots.push(c);
        } else {
            children.entry(c.parent_id).or_default().push(c);
        }
    }
    roots.sort_by_key(|c| (c.meta.audit.create_time, c.meta.id));
    for siblings in children.values_mut() {
        siblings.sort_by_key(|c| (c.meta.audit.create_time, c.meta.id));
    }

    let mut seen = HashSet::new();
    roots
        .into_iter()
        .map(|c| attach(c, &mut children, &mut urls_by_owner, &mut seen))
        .collect()
}

fn attach(
    classification: Classification,
    children: &mut HashMap<RecordId, Vec<Classification>>,
    urls: &mut HashMap<RecordId, Vec<UrlBinding>>,
    seen: &mut HashSet<RecordId>,
) -> ClassificationNode {
    let id = classification.meta.id;
    seen.insert(id);
    let mut kids = Vec::new();
    for child in children.remove(&id).unwrap_or_default() {
        if !seen.contains(&child.meta.id) {
            kids.push(attach(child, children, urls, seen));
        }
    }

    ClassificationNode {
        classification,
        urls: urls.remove(&id).unwrap_or_default(),
        children: kids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64, parent: u64, name: &str) -> Classification {
        let mut c = Classification::new(RecordId::from_u64(parent), name);
        c.meta.id = RecordId::from_u64(id);
        c.meta.audit.create_time = id as i64;
        c
    }

    fn url(id: u64, owner: u64, path: &str) -> UrlBinding {
        let mut u = UrlBinding::new(RecordId::from_u64(owner), path);
        u.meta.id = RecordId::from_u64(id);
        u
    }

    #[test]
    fn builds_nested_tree_with_urls() {
        let mut gone = node(4, 1, "deleted");
        gone.meta.deleted = true;

        let tree = build_tree(
            vec![node(2, 1, "roles"), node(1, 0, "user"), node(3, 0, "logs"), gone],
            vec![url(10, 2, "/api/user/v1/roles/page"), url(11, 3, "/api/user/v1/operation-logs/page")],
        );

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].classification.classification_name, "user");
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].urls.len(), 1);
        assert_eq!(tree[1].urls[0].url, "/api/user/v1/operation-logs/page");
    }

    #[test]
    fn removal_is_blocked_by_children_then_urls() {
        let id = RecordId::from_u64(1);
        assert!(matches!(
            Classification::ensure_removable(id, 1, 3),
            Err(DomainError::ConstraintViolation(msg)) if msg.contains("child")
        ));
        assert!(matches!(
            Classification::ensure_removable(id, 0, 3),
            Err(DomainError::ConstraintViolation(msg)) if msg.contains("3 url")
        ));
        assert!(Classification::ensure_removable(id, 0, 0).is_ok());
    }

    #[test]
    fn duplicate_endpoints_need_same_url_and_method() {
        let get = url(1, 2, "/a").with_method("get");
        let mut again = url(2, 2, "/a").with_method("GET");
        assert!(get.duplicates(&again));
        assert!(!get.duplicates(&get));
        assert!(!get.duplicates(&url(3, 2, "/a")));

        again.meta.deleted = true;
        assert!(!get.duplicates(&again));
    }

    #[test]
    fn orphans_become_roots() {
        let tree = build_tree(vec![node(5, 99, "orphan")], Vec::new());
        assert_eq!(tree.len(), 1);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn methods_are_normalized() {
        let u = UrlBinding::new(RecordId::from_u64(1), " /api/x ").with_method(" post ");
        assert_eq!(u.url, "/api/x");
        assert_eq!(u.method.as_deref(), Some("POST"));

        let mut blank = UrlBinding::new(RecordId::from_u64(1), "/api/x");
        blank.method = Some("  ".into());
        blank.normalize();
        assert_eq!(blank.method, None);
    }

    #[test]
    fn urls_need_an_owner_and_a_path() {
        assert!(UrlBinding::new(RecordId::ROOT, "/api/x").validate().is_err());
        assert!(UrlBinding::new(RecordId::from_u64(1), " ").validate().is_err());
        assert!(UrlBinding::new(RecordId::from_u64(1), "/api/x").validate().is_ok());
    }
}
