//! `keystone-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by every back-office
//! record (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod record;

pub use error::{DomainError, DomainResult};
pub use id::{RecordId, UserId};
pub use record::{utc_now_millis, AuditFields, ExpectedVersion, Record, RecordStatus};
