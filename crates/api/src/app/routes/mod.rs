use axum::Router;

pub mod classification_urls;
pub mod classifications;
pub mod operation_logs;
pub mod permission;
pub mod role_urls;
pub mod roles;
pub mod system;
pub mod user_roles;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .nest("/api/user/v1/roles", roles::router())
        .nest("/api/user/v1/classifications", classifications::router())
        .nest("/api/user/v1/classification-urls", classification_urls::router())
        .nest("/api/user/v1/role-urls", role_urls::router())
        .nest("/api/user/v1/user-roles", user_roles::router())
        .nest("/api/user/v1/operation-logs", operation_logs::router())
        .nest("/internal/user/v1/users/permission", permission::router())
}
