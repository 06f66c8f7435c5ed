use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::json;

use keystone_infra::admin::AdminError;

pub fn admin_error_to_response(err: AdminError) -> axum::response::Response {
    match err {
        AdminError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        AdminError::Constraint(msg) => json_error(StatusCode::CONFLICT, "constraint_violation", msg),
        AdminError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        AdminError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        AdminError::WriteFailed => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "write_failed", "write failed")
        }
        AdminError::Unavailable => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "integrity_unavailable",
            "integrity service unavailable",
        ),
        AdminError::IntegrityViolation { record, kind } => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "integrity_violation",
            format!("record {record} failed verification: {kind}"),
        ),
        AdminError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            e.to_string(),
        ),
    }
}

/// `200` with the JSON body, or the mapped admin error.
pub fn respond<T: Serialize>(result: Result<T, AdminError>) -> axum::response::Response {
    match result {
        Ok(body) => (StatusCode::OK, axum::Json(body)).into_response(),
        Err(e) => admin_error_to_response(e),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
