use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    routing::{get, post},
    Json, Router,
};

use keystone_rbac::UserRoleBinding;

use crate::app::dto::{CreateUserRoleRequest, IdRequest, PageQuery, UpdateUserRoleRequest};
use crate::app::{errors, services::AppServices};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/page", get(page))
        .route("/add", post(add))
        .route("/update", post(update))
        .route("/delete-by-id", post(delete_by_id))
}

pub async fn page(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<PageQuery>,
) -> axum::response::Response {
    errors::respond(services.admin.user_roles.list().map(|bindings| q.apply(bindings)))
}

/// POST /api/user/v1/user-roles/add - Bind a user to a role (one active binding per user)
pub async fn add(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<CreateUserRoleRequest>,
) -> axum::response::Response {
    let binding = UserRoleBinding::new(body.user_id, body.role_id);
    let result = services.admin.user_roles.create(binding, ctx.user_id()).await;
    services.invalidate_permissions();
    errors::respond(result)
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<UpdateUserRoleRequest>,
) -> axum::response::Response {
    let mut binding = match services.admin.user_roles.records().get(body.id) {
        Ok(binding) => binding,
        Err(e) => return errors::admin_error_to_response(e),
    };
    binding.user_id = body.user_id;
    binding.role_id = body.role_id;
    binding.meta.version = body.version;
    if let Some(status) = body.status {
        binding.meta.status = status;
    }

    let result = services.admin.user_roles.update(binding, ctx.user_id()).await;
    services.invalidate_permissions();
    errors::respond(result)
}

pub async fn delete_by_id(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<IdRequest>,
) -> axum::response::Response {
    let result = services.admin.user_roles.remove(body.id, ctx.user_id()).await;
    services.invalidate_permissions();
    errors::respond(result)
}
