use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};

use keystone_core::RecordId;
use keystone_rbac::AuditLogEntry;

use crate::app::dto::{AuditLogRequest, OperationLogQuery, VerifyResponse};
use crate::app::{errors, services::AppServices};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/page", get(page))
        .route("/batch", post(batch))
        .route("/verify/:id", get(verify))
}

/// GET /api/user/v1/operation-logs/page - Filtered audit entries, newest first
pub async fn page(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<OperationLogQuery>,
) -> axum::response::Response {
    let (filter, page) = q.into_parts();
    let (offset, limit) = page.bounds();
    errors::respond(services.audit.list(&filter, offset, limit))
}

/// POST /api/user/v1/operation-logs/batch - Append a batch of signed entries
pub async fn batch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<Vec<AuditLogRequest>>,
) -> axum::response::Response {
    let entries: Vec<AuditLogEntry> = body.into_iter().map(AuditLogEntry::from).collect();
    errors::respond(services.audit.record_batch(entries, ctx.user_id()).await)
}

pub async fn verify(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RecordId>,
) -> axum::response::Response {
    errors::respond(
        services
            .audit
            .verify(id)
            .await
            .map(|intact| VerifyResponse { intact }),
    )
}
