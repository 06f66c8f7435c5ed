use thiserror::Error;

use keystone_core::RecordId;

/// Why a stored record failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// The record carries no hash or no signature.
    Unsigned,
    /// The stored hash differs from a fresh recomputation.
    HashMismatch,
    /// The HSM rejected the stored signature.
    SignatureInvalid,
}

impl core::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ViolationKind::Unsigned => f.write_str("record is not signed"),
            ViolationKind::HashMismatch => f.write_str("data hash mismatch"),
            ViolationKind::SignatureInvalid => f.write_str("signature rejected"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    /// The HSM could not sign or verify; the surrounding write must abort.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The record was tampered with or corrupted. Never repaired silently.
    #[error("integrity violation on record {record}: {kind}")]
    Violation { record: RecordId, kind: ViolationKind },
}
