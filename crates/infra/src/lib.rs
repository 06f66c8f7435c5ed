//! Infrastructure layer: record stores, admin services, audit trail, config,
//! external service clients.

pub mod admin;
pub mod audit;
pub mod config;
pub mod external;
pub mod ids;
pub mod store;

mod integration_tests;
