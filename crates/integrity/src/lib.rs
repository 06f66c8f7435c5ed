//! `keystone-integrity` — tamper-evidence for persisted records.
//!
//! Every signable record carries a content hash and an HSM signature over a
//! canonical string built from its business fields. Stamping happens before a
//! write is persisted; verification can be re-run at any time.

pub mod canonical;
pub mod error;
pub mod guard;
pub mod hsm;
pub mod local;
pub mod stamp;

pub use canonical::{sha256_hex, Canonical};
pub use error::{IntegrityError, ViolationKind};
pub use guard::IntegrityGuard;
pub use hsm::{HsmClient, HsmError};
pub use local::LocalHsm;
pub use stamp::{IntegrityStamp, Signable, SIGN_ALGORITHM};
