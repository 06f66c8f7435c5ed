use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};

use keystone_core::RecordId;
use keystone_rbac::Role;

use crate::app::dto::{CreateRoleRequest, IdRequest, PageQuery, UpdateRoleRequest, VerifyResponse};
use crate::app::{errors, services::AppServices};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/page", get(page))
        .route("/add-role", post(add_role))
        .route("/update-role", post(update_role))
        .route("/delete-role", post(delete_role))
        .route("/verify/:id", get(verify))
}

/// GET /api/user/v1/roles/page - Live roles in creation order
pub async fn page(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<PageQuery>,
) -> axum::response::Response {
    errors::respond(services.admin.roles.list().map(|roles| q.apply(roles)))
}

pub async fn add_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<CreateRoleRequest>,
) -> axum::response::Response {
    let role = Role::new(body.role_name);
    errors::respond(services.admin.roles.create(role, ctx.user_id()).await)
}

pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<UpdateRoleRequest>,
) -> axum::response::Response {
    let mut role = match services.admin.roles.get(body.id) {
        Ok(role) => role,
        Err(e) => return errors::admin_error_to_response(e),
    };
    role.role_name = body.role_name;
    role.meta.version = body.version;
    if let Some(status) = body.status {
        role.meta.status = status;
    }

    let result = services.admin.roles.update(role, ctx.user_id()).await;
    services.invalidate_permissions();
    errors::respond(result)
}

pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<IdRequest>,
) -> axum::response::Response {
    let result = services.admin.roles.remove(body.id, ctx.user_id()).await;
    services.invalidate_permissions();
    errors::respond(result)
}

/// GET /api/user/v1/roles/verify/:id - Re-check a stored role against its stamp
pub async fn verify(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RecordId>,
) -> axum::response::Response {
    errors::respond(
        services
            .admin
            .roles
            .verify(id)
            .await
            .map(|intact| VerifyResponse { intact }),
    )
}
