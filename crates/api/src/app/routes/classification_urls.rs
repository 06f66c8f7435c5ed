use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    routing::{get, post},
    Json, Router,
};

use keystone_rbac::UrlBinding;

use crate::app::dto::{
    ClassificationUrlQuery, CreateClassificationUrlRequest, IdRequest, UpdateClassificationUrlRequest,
};
use crate::app::{errors, services::AppServices};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/page", get(page))
        .route("/add", post(add))
        .route("/update", post(update))
        .route("/delete-by-id", post(delete_by_id))
}

/// GET /api/user/v1/classification-urls/page?classificationId= - URLs, optionally of one classification
pub async fn page(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<ClassificationUrlQuery>,
) -> axum::response::Response {
    errors::respond(
        services
            .admin
            .classification_urls
            .list(q.classification_id)
            .map(|urls| q.page().apply(urls)),
    )
}

pub async fn add(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<CreateClassificationUrlRequest>,
) -> axum::response::Response {
    let mut url = UrlBinding::new(body.classification_id, body.url);
    url.method = body.method;
    url.description = body.description;

    let result = services.admin.classification_urls.create(url, ctx.user_id()).await;
    services.invalidate_permissions();
    errors::respond(result)
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<UpdateClassificationUrlRequest>,
) -> axum::response::Response {
    let mut url = match services.admin.classification_urls.get(body.id) {
        Ok(url) => url,
        Err(e) => return errors::admin_error_to_response(e),
    };
    url.classification_id = body.classification_id;
    url.url = body.url;
    url.method = body.method;
    url.description = body.description;
    url.meta.version = body.version;
    if let Some(status) = body.status {
        url.meta.status = status;
    }

    let result = services.admin.classification_urls.update(url, ctx.user_id()).await;
    services.invalidate_permissions();
    errors::respond(result)
}

pub async fn delete_by_id(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<IdRequest>,
) -> axum::response::Response {
    let result = services
        .admin
        .classification_urls
        .remove(body.id, ctx.user_id())
        .await;
    services.invalidate_permissions();
    errors::respond(result)
}
