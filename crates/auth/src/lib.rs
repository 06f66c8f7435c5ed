//! `keystone-auth` — URL-permission authorization boundary.
//!
//! Decoupled from HTTP and storage: the engine talks to two read ports and
//! returns an explicit [`Decision`]. Which routes are checked at all is an
//! explicit [`RouteTable`] handed to the transport layer.

pub mod authorize;
pub mod permissions;
pub mod ports;
pub mod roles;
pub mod routes;

pub use authorize::{AllowReason, AuthorizationEngine, Decision, DenyReason};
pub use permissions::{matches_public_pattern, UrlGrant};
pub use ports::{PermissionStore, PublicPathRegistry, StaticPublicPaths};
pub use roles::RoleId;
pub use routes::RouteTable;
