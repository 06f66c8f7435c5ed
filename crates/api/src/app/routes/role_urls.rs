use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    routing::{get, post},
    Json, Router,
};

use keystone_core::{Record, RecordId};
use keystone_infra::admin::AdminError;

use crate::app::dto::{PageQuery, UpdateRoleUrlRequest, UpdateUrlAndRoleRequest, UrlRoles};
use crate::app::{errors, services::AppServices};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/page", get(page))
        .route("/update-url-and-role", post(update_url_and_role))
        .route("/update", post(update))
}

/// GET /api/user/v1/role-urls/page - Every live URL with the roles bound to it
pub async fn page(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<PageQuery>,
) -> axum::response::Response {
    let result = services.admin.role_urls.roles_for_urls().and_then(|mut by_url| {
        let urls = services.admin.classification_urls.list(None)?;
        Ok(urls
            .into_iter()
            .map(|url| UrlRoles {
                roles: by_url.remove(&url.id()).unwrap_or_default(),
                url,
            })
            .collect::<Vec<_>>())
    });
    errors::respond(result.map(|rows| q.apply(rows)))
}

/// POST /api/user/v1/role-urls/update-url-and-role - Replace the role set of one URL
pub async fn update_url_and_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<UpdateUrlAndRoleRequest>,
) -> axum::response::Response {
    let url_id = match resolve_url(&services, &body) {
        Ok(id) => id,
        Err(e) => return errors::admin_error_to_response(e),
    };
    let result = services
        .admin
        .role_urls
        .sync_url_roles(url_id, &body.role_ids, ctx.user_id())
        .await;
    services.invalidate_permissions();
    errors::respond(result)
}

fn resolve_url(services: &AppServices, body: &UpdateUrlAndRoleRequest) -> Result<RecordId, AdminError> {
    if let Some(id) = body.url_id {
        return Ok(id);
    }
    let url = body
        .url
        .as_deref()
        .ok_or_else(|| AdminError::Validation("urlId or url is required".to_string()))?;
    services
        .admin
        .classification_urls
        .url_id_by_url(url)?
        .ok_or_else(|| AdminError::NotFound(format!("url {url}")))
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<UpdateRoleUrlRequest>,
) -> axum::response::Response {
    let mut edge = match services.admin.role_urls.records().get(body.id) {
        Ok(edge) => edge,
        Err(e) => return errors::admin_error_to_response(e),
    };
    edge.url_id = body.url_id;
    edge.role_id = body.role_id;
    edge.meta.version = body.version;
    if let Some(status) = body.status {
        edge.meta.status = status;
    }

    let result = services.admin.role_urls.update(edge, ctx.user_id()).await;
    services.invalidate_permissions();
    errors::respond(result)
}
