//! HTTP API application wiring (Axum router + service wiring).
//!
//! This folder is structured like:
//! - `services.rs`: infrastructure wiring (stores, HSM, permission adapters, engine)
//! - `routes/`: HTTP routes + handlers (one file per admin area)
//! - `dto.rs`: request/response DTOs and paging helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use keystone_infra::config::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::{AppServices, StartupError};

/// Build the full HTTP router from configuration (entrypoint used by `main.rs`).
pub fn build_app(config: &AppConfig) -> Result<(Router, Arc<AppServices>), StartupError> {
    let services = Arc::new(services::build_services(config)?);
    Ok((build_router(services.clone()), services))
}

/// Router over already-wired services.
pub fn build_router(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(Extension(services.clone()))
                .layer(axum::middleware::from_fn(middleware::context_middleware))
                .layer(axum::middleware::from_fn_with_state(
                    services,
                    middleware::permission_middleware,
                )),
        )
}
