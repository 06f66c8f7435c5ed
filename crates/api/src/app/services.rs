//! Service wiring: stores, HSM client, permission adapters and the engine.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use keystone_auth::{AuthorizationEngine, Decision, PublicPathRegistry, RouteTable, StaticPublicPaths};
use keystone_integrity::{HsmClient, HsmError, IntegrityGuard, LocalHsm};
use keystone_infra::{
    admin::AdminServices,
    audit::{AuditRecorder, RequestMeta},
    config::{AppConfig, HsmConfig},
    external::{
        DirectoryPermissionSource, FailClosedPermissionStore, FailClosedPublicPaths, HttpHsmClient,
        HttpPermissionSource, HttpPublicPathSource, PermissionSource, RemoteError,
    },
    ids::IdGenerator,
    store::InMemoryAuditLogStore,
};

use crate::authz;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("hsm client: {0}")]
    Hsm(#[from] HsmError),

    #[error("remote client: {0}")]
    Remote(#[from] RemoteError),
}

pub type PermissionCache = FailClosedPermissionStore<Arc<dyn PermissionSource>>;

/// Everything a handler or middleware needs, shared behind one `Arc`.
#[derive(Clone)]
pub struct AppServices {
    pub admin: AdminServices,
    pub audit: AuditRecorder,
    pub engine: AuthorizationEngine,
    pub routes: RouteTable,
    /// Answers the internal permission endpoints from the local records.
    pub directory: DirectoryPermissionSource,
    permissions: Arc<PermissionCache>,
    hsm: Arc<dyn HsmClient>,
}

impl AppServices {
    /// Drop cached permission answers after a change to roles or bindings.
    pub fn invalidate_permissions(&self) {
        self.permissions.invalidate();
    }

    /// Record one decision; a failed write is logged, never returned.
    pub async fn record_decision(&self, decision: &Decision, meta: RequestMeta) {
        if let Err(e) = self.audit.record_decision(decision, meta).await {
            warn!(error = %e, outcome = decision.label(), "audit entry for authorization decision was not stored");
        }
    }

    /// Release the HSM connection.
    pub async fn close(&self) {
        self.hsm.close().await;
    }
}

pub fn build_services(config: &AppConfig) -> Result<AppServices, StartupError> {
    let hsm = connect_hsm(&config.hsm)?;
    let mut guard = IntegrityGuard::new(hsm.clone());
    if let Some(public_key_id) = &config.hsm.public_key_id {
        guard = guard.with_public_key_id(public_key_id.clone());
    }

    let ids = Arc::new(IdGenerator::new(config.worker_id));
    let admin = AdminServices::in_memory(guard.clone(), ids.clone());
    let audit = AuditRecorder::new(Arc::new(InMemoryAuditLogStore::new()), guard, ids);
    let directory = DirectoryPermissionSource::new(admin.clone());

    let source: Arc<dyn PermissionSource> = match &config.permission_service_url {
        Some(url) => {
            info!(url = %url, "permissions resolved by remote service");
            Arc::new(HttpPermissionSource::new(url.clone(), config.remote.timeout)?)
        }
        None => Arc::new(directory.clone()),
    };
    let permissions = Arc::new(FailClosedPermissionStore::new(source, &config.remote));

    let public_paths: Arc<dyn PublicPathRegistry> = match &config.gateway_url {
        Some(url) => {
            info!(url = %url, "public paths resolved by gateway");
            Arc::new(FailClosedPublicPaths::new(
                HttpPublicPathSource::new(url.clone(), config.remote.timeout)?,
                &config.remote,
            ))
        }
        None => Arc::new(StaticPublicPaths::new(config.public_paths.clone())),
    };

    let engine = AuthorizationEngine::new(permissions.clone(), public_paths);

    Ok(AppServices {
        admin,
        audit,
        engine,
        routes: authz::guarded_routes(),
        directory,
        permissions,
        hsm,
    })
}

fn connect_hsm(config: &HsmConfig) -> Result<Arc<dyn HsmClient>, StartupError> {
    if !config.enabled {
        warn!("HSM disabled; every signed write will be refused");
        return Ok(Arc::new(LocalHsm::disabled()));
    }
    match &config.service_url {
        Some(_) => Ok(Arc::new(HttpHsmClient::connect(config)?)),
        None => Ok(Arc::new(LocalHsm::new(&config.dev_secret))),
    }
}
