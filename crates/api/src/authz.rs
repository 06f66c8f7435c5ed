//! URL-permission guard for the HTTP surface.
//!
//! Which routes go through the authorization engine is decided here, in one
//! explicit table, instead of per-handler markers.

use axum::http::StatusCode;
use axum::response::Response;

use keystone_auth::{Decision, RouteTable};

use crate::app::errors::json_error;

/// Routes that must pass the URL-permission check.
pub fn guarded_routes() -> RouteTable {
    RouteTable::new()
        .guard("GET", "/api/user/v1/classifications/page")
        .guard("POST", "/api/user/v1/classifications/add")
        .guard("POST", "/api/user/v1/classifications/update")
        .guard("POST", "/api/user/v1/classifications/delete-by-id")
        .guard("GET", "/api/user/v1/role-urls/page")
        .guard("POST", "/api/user/v1/role-urls/update-url-and-role")
        .guard("POST", "/api/user/v1/role-urls/update")
        .guard("GET", "/api/user/v1/user-roles/page")
        .guard("POST", "/api/user/v1/user-roles/add")
        .guard("POST", "/api/user/v1/user-roles/update")
        .guard("POST", "/api/user/v1/user-roles/delete-by-id")
}

/// The response for a refused decision, or `None` when the request may proceed.
pub fn rejection(decision: &Decision) -> Option<Response> {
    match decision {
        Decision::Allow(_) => None,
        Decision::Unauthenticated => Some(json_error(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "authentication required",
        )),
        Decision::Deny { reason, .. } => Some(json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            reason.message(),
        )),
    }
}
