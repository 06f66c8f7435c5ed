//! Internal permission lookups, served from this service's own records.
//!
//! These answer the same contract a remote permission service does, so other
//! instances can point their permission adapter here.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use keystone_auth::RoleId;
use keystone_infra::external::PermissionSource;

use crate::app::{errors, services::AppServices};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleQuery {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlsQuery {
    pub role_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub role_id: Option<String>,
}

pub fn router() -> Router {
    Router::new()
        .route("/role", get(role))
        .route("/urls", get(urls))
}

/// GET /internal/user/v1/users/permission/role?userId= - Active role of a user
pub async fn role(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<RoleQuery>,
) -> axum::response::Response {
    match services.directory.role_for_user(q.user_id.trim()).await {
        Ok(role) => (
            StatusCode::OK,
            Json(RoleResponse {
                role_id: role.map(|r| r.as_str().to_string()),
            }),
        )
            .into_response(),
        Err(e) => errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "permission_lookup_failed", e.to_string()),
    }
}

/// GET /internal/user/v1/users/permission/urls?roleId= - URLs granted to a role
pub async fn urls(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<UrlsQuery>,
) -> axum::response::Response {
    match services.directory.urls_for_role(&RoleId::new(q.role_id.trim())).await {
        Ok(grants) => (StatusCode::OK, Json(grants)).into_response(),
        Err(e) => errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "permission_lookup_failed", e.to_string()),
    }
}
