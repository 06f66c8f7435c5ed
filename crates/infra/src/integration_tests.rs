//! Integration tests across the admin services and the authorization path.
//!
//! Tests: admin write → signed store → permission source → engine → audit
//!
//! Verifies:
//! - Binding rules hold across services (one active role per user, no
//!   orphaned classifications)
//! - Permissions managed through the admin services drive real decisions
//! - Every decision leaves a verifiable audit entry
//! - Binding rules still hold when writes interleave across HSM round trips

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use keystone_auth::{AuthorizationEngine, Decision, StaticPublicPaths};
    use keystone_core::{Record, RecordId, RecordStatus, UserId};
    use async_trait::async_trait;
    use keystone_integrity::{HsmClient, HsmError, IntegrityGuard, LocalHsm};
    use keystone_rbac::{AuditLogFilter, Classification, Outcome, Role, UrlBinding, UserRoleBinding};

    use crate::admin::{AdminError, AdminServices};
    use crate::audit::{AuditRecorder, RequestMeta};
    use crate::config::RemoteConfig;
    use crate::external::{DirectoryPermissionSource, FailClosedPermissionStore};
    use crate::ids::IdGenerator;
    use crate::store::InMemoryAuditLogStore;

    fn guard() -> IntegrityGuard {
        IntegrityGuard::new(Arc::new(LocalHsm::new("integration")))
    }

    fn setup() -> AdminServices {
        AdminServices::in_memory(guard(), Arc::new(IdGenerator::new(3)))
    }

    /// Software HSM that suspends on every call, like a network round trip,
    /// so concurrent writes interleave between their checks and their stores.
    struct YieldingHsm(LocalHsm);

    #[async_trait]
    impl HsmClient for YieldingHsm {
        async fn sign(&self, payload: &[u8]) -> Result<String, HsmError> {
            tokio::task::yield_now().await;
            self.0.sign(payload).await
        }

        async fn verify(&self, payload: &[u8], signature: &str) -> Result<bool, HsmError> {
            tokio::task::yield_now().await;
            self.0.verify(payload, signature).await
        }

        async fn encrypt(&self, plaintext: &[u8]) -> Result<String, HsmError> {
            tokio::task::yield_now().await;
            self.0.encrypt(plaintext).await
        }

        async fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, HsmError> {
            tokio::task::yield_now().await;
            self.0.decrypt(ciphertext).await
        }
    }

    fn interleaving_setup() -> AdminServices {
        let guard = IntegrityGuard::new(Arc::new(YieldingHsm(LocalHsm::new("integration"))));
        AdminServices::in_memory(guard, Arc::new(IdGenerator::new(4)))
    }

    fn active_bindings_of(services: &AdminServices, user: &str) -> usize {
        services
            .user_roles
            .records()
            .list_where(|b| b.is_active_binding() && b.user_id == user)
            .unwrap()
            .len()
    }

    fn admin() -> UserId {
        UserId::new("admin")
    }

    struct Fixture {
        services: AdminServices,
        role: Role,
        url: UrlBinding,
    }

    /// One role bound to `POST /api/user/v1/roles/add-role`, with user `u1`.
    async fn seeded() -> Fixture {
        let services = setup();
        let actor = admin();
        let role = services
            .roles
            .create(Role::new("editor"), Some(&actor))
            .await
            .unwrap();
        let menu = services
            .classifications
            .create(Classification::new(RecordId::ROOT, "roles"), Some(&actor))
            .await
            .unwrap();
        let url = services
            .classification_urls
            .create(
                UrlBinding::new(menu.id(), "/api/user/v1/roles/add-role").with_method("post"),
                Some(&actor),
            )
            .await
            .unwrap();
        services
            .role_urls
            .sync_url_roles(url.id(), &[role.id()], Some(&actor))
            .await
            .unwrap();
        services
            .user_roles
            .create(UserRoleBinding::new("u1", role.id()), Some(&actor))
            .await
            .unwrap();
        Fixture { services, role, url }
    }

    fn engine(services: &AdminServices, public: &[&str]) -> AuthorizationEngine {
        let store = FailClosedPermissionStore::new(
            DirectoryPermissionSource::new(services.clone()),
            &RemoteConfig::default(),
        );
        AuthorizationEngine::new(
            Arc::new(store),
            Arc::new(StaticPublicPaths::new(public.iter().map(|p| p.to_string()))),
        )
    }

    #[tokio::test]
    async fn a_user_holds_at_most_one_active_role() {
        let f = seeded().await;
        let other = f
            .services
            .roles
            .create(Role::new("viewer"), Some(&admin()))
            .await
            .unwrap();

        let err = f
            .services
            .user_roles
            .create(UserRoleBinding::new(" u1 ", other.id()), Some(&admin()))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Constraint(_)));

        // Once the binding is gone the user can be rebound.
        let current = f.services.user_roles.role_for_user("u1").unwrap().unwrap();
        f.services.user_roles.remove(current.id(), Some(&admin())).await.unwrap();
        let rebound = f
            .services
            .user_roles
            .create(UserRoleBinding::new("u1", other.id()), Some(&admin()))
            .await
            .unwrap();
        assert_eq!(
            f.services.user_roles.role_for_user("u1").unwrap().map(|b| b.id()),
            Some(rebound.id())
        );
    }

    #[tokio::test]
    async fn classifications_with_content_cannot_be_removed() {
        let f = seeded().await;
        let menu = f.url.classification_id;
        let child = f
            .services
            .classifications
            .create(Classification::new(menu, "sub"), Some(&admin()))
            .await
            .unwrap();

        let err = f.services.classifications.remove(menu, Some(&admin())).await.unwrap_err();
        assert!(matches!(err, AdminError::Constraint(_)));

        f.services.classifications.remove(child.id(), Some(&admin())).await.unwrap();
        let err = f.services.classifications.remove(menu, Some(&admin())).await.unwrap_err();
        assert!(matches!(err, AdminError::Constraint(_)), "urls still attached");

        f.services.classification_urls.remove(f.url.id(), Some(&admin())).await.unwrap();
        let removed = f.services.classifications.remove(menu, Some(&admin())).await.unwrap();
        assert!(removed.is_deleted());

        let tree = f.services.classifications.tree().unwrap();
        assert!(tree.is_empty());
    }

    #[tokio::test]
    async fn syncing_url_roles_adds_and_removes_edges() {
        let f = seeded().await;
        let viewer = f
            .services
            .roles
            .create(Role::new("viewer"), Some(&admin()))
            .await
            .unwrap();

        let edges = f
            .services
            .role_urls
            .sync_url_roles(f.url.id(), &[viewer.id()], Some(&admin()))
            .await
            .unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].role_id, viewer.id());
        assert_eq!(edges[0].role_name.as_deref(), Some("viewer"));

        assert!(f.services.role_urls.urls_for_role(f.role.id()).unwrap().is_empty());
        let granted = f.services.role_urls.urls_for_role(viewer.id()).unwrap();
        assert_eq!(granted.len(), 1);
        assert_eq!(granted[0].url, "/api/user/v1/roles/add-role");

        // Syncing the same set again changes nothing.
        let again = f
            .services
            .role_urls
            .sync_url_roles(f.url.id(), &[viewer.id()], Some(&admin()))
            .await
            .unwrap();
        assert_eq!(again[0].id(), edges[0].id());
    }

    #[tokio::test]
    async fn admin_records_drive_authorization() {
        let f = seeded().await;
        let engine = engine(&f.services, &["/api/auth/**"]);

        let allowed = engine.decide(Some("u1"), "/api/user/v1/roles/add-role", "POST").await;
        assert!(allowed.is_allowed());
        assert_eq!(allowed.role_id().map(|r| r.as_str().to_string()), Some(f.role.id().to_string()));

        let wrong_method = engine.decide(Some("u1"), "/api/user/v1/roles/add-role", "DELETE").await;
        assert!(!wrong_method.is_allowed());

        let stranger = engine.decide(Some("u9"), "/api/user/v1/roles/add-role", "POST").await;
        assert!(matches!(stranger, Decision::Deny { role: None, .. }));

        let public = engine.decide(None, "/api/auth/login", "POST").await;
        assert!(public.is_allowed());
        let anonymous = engine.decide(None, "/api/user/v1/roles/add-role", "POST").await;
        assert!(matches!(anonymous, Decision::Unauthenticated));
    }

    #[tokio::test]
    async fn disabled_roles_grant_nothing() {
        let f = seeded().await;
        let mut role = f.role.clone();
        role.meta.status = RecordStatus::Disabled;
        f.services.roles.update(role, Some(&admin())).await.unwrap();

        let engine = engine(&f.services, &[]);
        let decision = engine.decide(Some("u1"), "/api/user/v1/roles/add-role", "POST").await;
        assert!(!decision.is_allowed());
    }

    #[tokio::test]
    async fn decisions_are_audited_and_verifiable() {
        let f = seeded().await;
        let engine = engine(&f.services, &[]);
        let recorder = AuditRecorder::new(
            Arc::new(InMemoryAuditLogStore::new()),
            guard(),
            Arc::new(IdGenerator::new(4)),
        );

        for (user, method) in [("u1", "POST"), ("u1", "PUT"), ("u9", "POST")] {
            let url = "/api/user/v1/roles/add-role";
            let decision = engine.decide(Some(user), url, method).await;
            recorder
                .record_decision(
                    &decision,
                    RequestMeta {
                        user_id: Some(user.to_string()),
                        url: url.to_string(),
                        method: method.to_string(),
                        ..RequestMeta::default()
                    },
                )
                .await
                .unwrap();
        }

        let failures = recorder
            .list(
                &AuditLogFilter {
                    outcome: Some(Outcome::Fail),
                    ..AuditLogFilter::default()
                },
                0,
                10,
            )
            .unwrap();
        assert_eq!(failures.total, 2);
        for entry in &failures.items {
            assert!(entry.error_msg.is_some());
            assert!(recorder.verify(entry.id()).await.unwrap());
        }
    }

    #[tokio::test]
    async fn rebinding_onto_a_bound_user_is_rejected() {
        let f = seeded().await;
        let other = f
            .services
            .user_roles
            .create(UserRoleBinding::new("u2", f.role.id()), Some(&admin()))
            .await
            .unwrap();

        let mut moved = other.clone();
        moved.user_id = "u1".to_string();
        let err = f.services.user_roles.update(moved, Some(&admin())).await.unwrap_err();
        assert!(matches!(err, AdminError::Constraint(msg) if msg.contains("u1")));

        // A disabled binding does not count toward the rule.
        let mut parked = other.clone();
        parked.user_id = "u1".to_string();
        parked.meta.status = RecordStatus::Disabled;
        f.services.user_roles.update(parked, Some(&admin())).await.unwrap();
        assert_eq!(active_bindings_of(&f.services, "u1"), 1);
    }

    #[tokio::test]
    async fn concurrent_rebinds_leave_one_active_role_per_user() {
        let services = interleaving_setup();
        let actor = admin();
        let role = services.roles.create(Role::new("editor"), Some(&actor)).await.unwrap();
        let a = services
            .user_roles
            .create(UserRoleBinding::new("u2", role.id()), Some(&actor))
            .await
            .unwrap();
        let b = services
            .user_roles
            .create(UserRoleBinding::new("u3", role.id()), Some(&actor))
            .await
            .unwrap();

        let mut a2 = a.clone();
        a2.user_id = "u1".to_string();
        let mut b2 = b.clone();
        b2.user_id = "u1".to_string();
        let (ra, rb) = tokio::join!(
            services.user_roles.update(a2, Some(&actor)),
            services.user_roles.update(b2, Some(&actor)),
        );

        assert!(ra.is_ok() ^ rb.is_ok(), "exactly one rebind wins: {ra:?} / {rb:?}");
        let loser = ra.and(rb).unwrap_err();
        assert!(matches!(loser, AdminError::Constraint(_)));
        assert_eq!(active_bindings_of(&services, "u1"), 1);
    }

    #[tokio::test]
    async fn concurrent_creates_leave_one_active_role_per_user() {
        let services = interleaving_setup();
        let actor = admin();
        let role = services.roles.create(Role::new("editor"), Some(&actor)).await.unwrap();

        let (ra, rb) = tokio::join!(
            services.user_roles.create(UserRoleBinding::new("u1", role.id()), Some(&actor)),
            services.user_roles.create(UserRoleBinding::new("u1", role.id()), Some(&actor)),
        );

        assert!(ra.is_ok() ^ rb.is_ok());
        assert_eq!(active_bindings_of(&services, "u1"), 1);
    }

    #[tokio::test]
    async fn removing_a_parent_races_safely_with_new_content() {
        let services = interleaving_setup();
        let actor = admin();
        let parent = services
            .classifications
            .create(Classification::new(RecordId::ROOT, "menu"), Some(&actor))
            .await
            .unwrap();

        let (removed, child) = tokio::join!(
            services.classifications.remove(parent.id(), Some(&actor)),
            services
                .classifications
                .create(Classification::new(parent.id(), "child"), Some(&actor)),
        );
        assert!(removed.is_ok() ^ child.is_ok(), "{removed:?} / {child:?}");

        let (removed_again, url) = tokio::join!(
            services.classifications.remove(parent.id(), Some(&actor)),
            services
                .classification_urls
                .create(UrlBinding::new(parent.id(), "/api/user/v1/roles/page"), Some(&actor)),
        );
        assert!(removed_again.is_err() || url.is_err());

        let parent_live = services.classifications.get(parent.id()).is_ok();
        let children = services
            .classifications
            .list()
            .unwrap()
            .into_iter()
            .filter(|c| c.parent_id == parent.id())
            .count();
        let urls = services.classification_urls.list(Some(parent.id())).unwrap().len();
        assert!(parent_live || children + urls == 0, "live content under a deleted node");
    }
}
