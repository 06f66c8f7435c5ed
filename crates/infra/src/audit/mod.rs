pub mod recorder;

pub use recorder::{AuditPage, AuditRecorder, RequestMeta};
