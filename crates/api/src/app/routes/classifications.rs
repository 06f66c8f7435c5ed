use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    routing::{get, post},
    Json, Router,
};

use keystone_rbac::Classification;

use crate::app::dto::{CreateClassificationRequest, IdRequest, PageQuery, UpdateClassificationRequest};
use crate::app::{errors, services::AppServices};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/page", get(page))
        .route("/add", post(add))
        .route("/update", post(update))
        .route("/delete-by-id", post(delete_by_id))
}

/// GET /api/user/v1/classifications/page - Classification forest, paged by root
pub async fn page(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<PageQuery>,
) -> axum::response::Response {
    errors::respond(services.admin.classifications.tree().map(|roots| q.apply(roots)))
}

pub async fn add(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<CreateClassificationRequest>,
) -> axum::response::Response {
    let classification = Classification::new(body.parent_id, body.classification_name);
    errors::respond(
        services
            .admin
            .classifications
            .create(classification, ctx.user_id())
            .await,
    )
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<UpdateClassificationRequest>,
) -> axum::response::Response {
    let mut classification = match services.admin.classifications.get(body.id) {
        Ok(c) => c,
        Err(e) => return errors::admin_error_to_response(e),
    };
    classification.parent_id = body.parent_id;
    classification.classification_name = body.classification_name;
    classification.meta.version = body.version;
    if let Some(status) = body.status {
        classification.meta.status = status;
    }
    errors::respond(
        services
            .admin
            .classifications
            .update(classification, ctx.user_id())
            .await,
    )
}

pub async fn delete_by_id(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<IdRequest>,
) -> axum::response::Response {
    errors::respond(
        services
            .admin
            .classifications
            .remove(body.id, ctx.user_id())
            .await,
    )
}
